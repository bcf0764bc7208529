use std::hint::black_box;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use respond::{Capability, ConditionSource, InMemoryConditionSource, Listener, Responder};

const QUERY: &str = "screen and (min-width: 700px) and (max-width: 900px)";

fn make_engine(listeners: usize) -> (Responder, Arc<InMemoryConditionSource>, Arc<AtomicUsize>) {
    let source = Arc::new(InMemoryConditionSource::new());
    let engine = Responder::new(
        Arc::clone(&source) as Arc<dyn ConditionSource>,
        Capability::Live,
    );

    let hits = Arc::new(AtomicUsize::new(0));
    for i in 0..listeners {
        let on_match = {
            let hits = Arc::clone(&hits);
            move || {
                hits.fetch_add(1, Ordering::Relaxed);
            }
        };
        let on_no_match = {
            let hits = Arc::clone(&hits);
            move || {
                hits.fetch_add(1, Ordering::Relaxed);
            }
        };
        engine
            .register(
                Listener::builder()
                    .namespace(format!("listener-{i}"))
                    .expression(QUERY)
                    .on_match(on_match)
                    .on_no_match(on_no_match)
                    .build()
                    .unwrap(),
            )
            .unwrap();
    }
    engine.ready().unwrap();

    (engine, source, hits)
}

fn bench_canonicalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch/canonicalize");
    group.throughput(Throughput::Elements(1));
    group.bench_function("composite_query", |b| {
        b.iter(|| respond::canonicalize(black_box(QUERY)));
    });
    group.finish();
}

fn bench_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch/fanout");
    for listeners in [1usize, 16, 256] {
        group.throughput(Throughput::Elements(listeners as u64));
        group.bench_function(format!("{listeners}_listeners"), |b| {
            let (_engine, source, hits) = make_engine(listeners);
            let mut matches = false;
            b.iter(|| {
                // Every iteration is a real transition, so the full fan-out runs.
                matches = !matches;
                source.set_matches(QUERY, matches);
                black_box(hits.load(Ordering::Relaxed));
            });
        });
    }
    group.finish();
}

fn bench_registration_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch/retrieve");
    group.bench_function("256_listeners", |b| {
        let (engine, _source, _hits) = make_engine(256);
        b.iter(|| black_box(engine.retrieve(black_box("listener-128"), Some(QUERY))));
    });
    group.finish();
}

criterion_group!(benches, bench_canonicalize, bench_fanout, bench_registration_lookup);
criterion_main!(benches);
