use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use respond::{
    Capability, CallbackKind, ConditionSource, ConditionState, InMemoryConditionSource, Listener,
    Responder,
};

const NAV_QUERY: &str = "(min-width: 700px)";

fn live_engine() -> (Responder, Arc<InMemoryConditionSource>) {
    let source = Arc::new(InMemoryConditionSource::new());
    let engine = Responder::new(
        Arc::clone(&source) as Arc<dyn ConditionSource>,
        Capability::Live,
    );
    (engine, source)
}

fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
    let hits = Arc::new(AtomicUsize::new(0));
    let cb = {
        let hits = Arc::clone(&hits);
        move || {
            hits.fetch_add(1, Ordering::SeqCst);
        }
    };
    (hits, cb)
}

fn order_entry(
    log: &Arc<Mutex<Vec<&'static str>>>,
    name: &'static str,
) -> impl Fn() + Send + Sync + 'static {
    let log = Arc::clone(log);
    move || {
        log.lock().unwrap().push(name);
    }
}

#[test]
fn ready_dispatches_current_result_exactly_once() {
    let (engine, source) = live_engine();
    source.set_matches(NAV_QUERY, true);

    let (matched, on_match) = counter();
    let (unmatched, on_no_match) = counter();

    engine
        .register(
            Listener::builder()
                .namespace("nav")
                .expression(NAV_QUERY)
                .on_match(on_match)
                .on_no_match(on_no_match)
                .build()
                .unwrap(),
        )
        .unwrap();

    // Nothing fires until the startup sync.
    assert_eq!(matched.load(Ordering::SeqCst), 0);

    engine.ready().unwrap();
    assert_eq!(matched.load(Ordering::SeqCst), 1);
    assert_eq!(unmatched.load(Ordering::SeqCst), 0);

    // A later transition fires the other callback exactly once.
    source.set_matches(NAV_QUERY, false);
    assert_eq!(matched.load(Ordering::SeqCst), 1);
    assert_eq!(unmatched.load(Ordering::SeqCst), 1);

    let sub = engine.subscription(NAV_QUERY).unwrap();
    assert_eq!(sub.state, ConditionState::NotMatched);
}

#[test]
fn duplicate_registration_is_a_no_op() {
    let (engine, source) = live_engine();
    let (matched, on_match) = counter();

    engine
        .register(
            Listener::builder()
                .namespace("nav")
                .expression(NAV_QUERY)
                .on_match(on_match)
                .build()
                .unwrap(),
        )
        .unwrap();

    // Same namespace under an equivalent spelling of the same condition.
    let (second, second_match) = counter();
    engine
        .register(
            Listener::builder()
                .namespace("nav")
                .expression("(MIN-WIDTH:700px)")
                .on_match(second_match)
                .build()
                .unwrap(),
        )
        .unwrap();

    engine.ready().unwrap();
    source.set_matches(NAV_QUERY, true);

    assert_eq!(engine.subscription(NAV_QUERY).unwrap().listeners.len(), 1);
    assert_eq!(matched.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 0);
}

#[test]
fn equivalent_expressions_share_one_subscription() {
    let (engine, source) = live_engine();
    let (nav_hits, nav_match) = counter();
    let (side_hits, side_match) = counter();

    engine
        .register_all([
            Listener::builder()
                .namespace("nav")
                .expression("(min-width: 700px)")
                .on_match(nav_match)
                .build()
                .unwrap(),
            Listener::builder()
                .namespace("sidebar")
                .expression("(MIN-WIDTH: 700px)")
                .on_match(side_match)
                .build()
                .unwrap(),
        ])
        .unwrap();

    assert_eq!(engine.snapshot().len(), 1);

    engine.ready().unwrap();
    source.set_matches("(min-width: 700px)", true);

    // One condition change fans out to both namespaces.
    assert_eq!(nav_hits.load(Ordering::SeqCst), 1);
    assert_eq!(side_hits.load(Ordering::SeqCst), 1);
}

#[test]
fn fanout_runs_in_registration_order() {
    let (engine, source) = live_engine();
    let log = Arc::new(Mutex::new(Vec::new()));

    for name in ["first", "second", "third"] {
        engine
            .register(
                Listener::builder()
                    .namespace(name)
                    .expression(NAV_QUERY)
                    .on_match(order_entry(&log, name))
                    .build()
                    .unwrap(),
            )
            .unwrap();
    }

    source.set_matches(NAV_QUERY, true);
    assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
}

#[test]
fn late_registration_after_ready_syncs_immediately() {
    let (engine, source) = live_engine();
    source.set_matches(NAV_QUERY, true);

    let (early, early_match) = counter();
    engine
        .register(
            Listener::builder()
                .namespace("nav")
                .expression(NAV_QUERY)
                .on_match(early_match)
                .build()
                .unwrap(),
        )
        .unwrap();

    engine.ready().unwrap();
    assert_eq!(early.load(Ordering::SeqCst), 1);

    // Registered after ready: dispatched the current result right away,
    // without re-firing the earlier listener.
    let (late, late_match) = counter();
    engine
        .register(
            Listener::builder()
                .namespace("toolbar")
                .expression(NAV_QUERY)
                .on_match(late_match)
                .build()
                .unwrap(),
        )
        .unwrap();

    assert_eq!(late.load(Ordering::SeqCst), 1);
    assert_eq!(early.load(Ordering::SeqCst), 1);

    let snap = engine.retrieve("toolbar", Some(NAV_QUERY)).unwrap();
    assert!(!snap.pending_initial);
}

#[test]
fn remove_listener_then_retrieve_is_absent() {
    let (engine, _source) = live_engine();
    engine
        .register(
            Listener::builder()
                .namespace("nav")
                .expression(NAV_QUERY)
                .build()
                .unwrap(),
        )
        .unwrap();

    assert!(engine.remove_listener(NAV_QUERY, "nav"));
    assert!(engine.retrieve("nav", Some(NAV_QUERY)).is_none());

    // The subscription survives namespace-scoped removal.
    assert!(engine.subscription(NAV_QUERY).is_some());
    assert!(!engine.remove_listener(NAV_QUERY, "nav"));
}

#[test]
fn remove_key_discards_subscription_and_silences_dispatch() {
    let (engine, source) = live_engine();
    let (hits, on_match) = counter();

    engine
        .register(
            Listener::builder()
                .namespace("nav")
                .expression(NAV_QUERY)
                .on_match(on_match)
                .build()
                .unwrap(),
        )
        .unwrap();

    assert!(source.is_watched(NAV_QUERY));
    assert!(engine.remove_key(NAV_QUERY));
    assert!(engine.subscription(NAV_QUERY).is_none());
    assert!(!source.is_watched(NAV_QUERY));
    assert!(!engine.remove_key(NAV_QUERY));

    // Neither the startup sync nor a later transition reaches the
    // discarded listeners.
    engine.ready().unwrap();
    source.set_matches(NAV_QUERY, true);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn legacy_capability_fires_fallback_callbacks() {
    let source = Arc::new(InMemoryConditionSource::new());
    let engine = Responder::new(
        Arc::clone(&source) as Arc<dyn ConditionSource>,
        Capability::Legacy,
    );

    assert_eq!(engine.capability(), Capability::Legacy);

    let (matched, on_match) = counter();
    let (unmatched, on_no_match) = counter();

    engine
        .register_all([
            Listener::builder()
                .namespace("nav")
                .expression(NAV_QUERY)
                .on_match(on_match)
                .build()
                .unwrap(),
            Listener::builder()
                .namespace("sidebar")
                .expression(NAV_QUERY)
                .on_no_match(on_no_match)
                .fallback(CallbackKind::NoMatch)
                .build()
                .unwrap(),
        ])
        .unwrap();

    engine.ready().unwrap();

    // Default fallback is the match callback; sidebar opted into no-match.
    assert_eq!(matched.load(Ordering::SeqCst), 1);
    assert_eq!(unmatched.load(Ordering::SeqCst), 1);

    let sub = engine.subscription(NAV_QUERY).unwrap();
    assert!(!sub.live);
    assert_eq!(sub.state, ConditionState::Unknown);
}

#[test]
fn call_invokes_named_callback_regardless_of_state() {
    let (engine, _source) = live_engine();
    let (matched, on_match) = counter();
    let (unmatched, on_no_match) = counter();

    engine
        .register(
            Listener::builder()
                .namespace("nav")
                .expression(NAV_QUERY)
                .on_match(on_match)
                .on_no_match(on_no_match)
                .build()
                .unwrap(),
        )
        .unwrap();

    engine
        .call("nav", Some(CallbackKind::NoMatch), Some(NAV_QUERY))
        .unwrap();
    engine.call("nav", Some(CallbackKind::Match), None).unwrap();

    assert_eq!(matched.load(Ordering::SeqCst), 1);
    assert_eq!(unmatched.load(Ordering::SeqCst), 1);
}

#[test]
fn call_without_method_redispatches_one_namespace() {
    let (engine, source) = live_engine();
    source.set_matches(NAV_QUERY, true);

    let (nav_hits, nav_match) = counter();
    let (side_hits, side_match) = counter();

    engine
        .register_all([
            Listener::builder()
                .namespace("nav")
                .expression(NAV_QUERY)
                .on_match(nav_match)
                .build()
                .unwrap(),
            Listener::builder()
                .namespace("sidebar")
                .expression(NAV_QUERY)
                .on_match(side_match)
                .build()
                .unwrap(),
        ])
        .unwrap();

    engine.call("nav", None, None).unwrap();

    assert_eq!(nav_hits.load(Ordering::SeqCst), 1);
    assert_eq!(side_hits.load(Ordering::SeqCst), 0);
}

#[test]
fn call_failures_are_typed() {
    let (engine, _source) = live_engine();

    let err = engine.call("ghost", None, None).unwrap_err();
    assert!(err.is_not_found());

    engine
        .register(
            Listener::builder()
                .namespace("nav")
                .expression(NAV_QUERY)
                .on_match(|| {})
                .build()
                .unwrap(),
        )
        .unwrap();

    let err = engine.call("nav", Some(CallbackKind::NoMatch), None).unwrap_err();
    assert!(err.is_call());
    assert!(!err.is_not_found());

    let err = engine.call("nav", None, Some("print")).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn snapshot_serializes_for_introspection() {
    let (engine, source) = live_engine();
    source.set_matches(NAV_QUERY, true);

    engine
        .register(
            Listener::builder()
                .namespace("nav")
                .expression(NAV_QUERY)
                .on_match(|| {})
                .build()
                .unwrap(),
        )
        .unwrap();
    engine.ready().unwrap();

    let sub = engine.subscription(NAV_QUERY).unwrap();
    let json = serde_json::to_value(&sub).unwrap();

    assert_eq!(json["key"], "_min_width_700px");
    assert_eq!(json["expression"], NAV_QUERY);
    assert_eq!(json["live"], true);
    assert_eq!(json["state"], "matched");
    assert_eq!(json["listeners"][0]["namespace"], "nav");
    assert_eq!(json["listeners"][0]["has_on_match"], true);
    assert_eq!(json["listeners"][0]["has_on_no_match"], false);
    assert_eq!(json["listeners"][0]["pending_initial"], false);
}

#[test]
fn listener_missing_callback_is_skipped_not_an_error() {
    let (engine, source) = live_engine();
    let (side_hits, side_match) = counter();

    engine
        .register_all([
            // No on_match at all: skipped silently during true dispatches.
            Listener::builder()
                .namespace("nav")
                .expression(NAV_QUERY)
                .on_no_match(|| {})
                .build()
                .unwrap(),
            Listener::builder()
                .namespace("sidebar")
                .expression(NAV_QUERY)
                .on_match(side_match)
                .build()
                .unwrap(),
        ])
        .unwrap();

    source.set_matches(NAV_QUERY, true);
    assert_eq!(side_hits.load(Ordering::SeqCst), 1);
}

#[test]
fn callbacks_may_reenter_the_engine() {
    let (engine, source) = live_engine();

    let reentrant = engine.clone();
    engine
        .register(
            Listener::builder()
                .namespace("nav")
                .expression(NAV_QUERY)
                .on_match(move || {
                    // Lookups from inside a dispatch must not deadlock.
                    assert!(reentrant.retrieve("nav", None).is_some());
                })
                .build()
                .unwrap(),
        )
        .unwrap();

    source.set_matches(NAV_QUERY, true);
}
