//! In-memory condition source.
//!
//! A complete, synchronous [`ConditionSource`] implementation with no
//! platform behind it: the host (usually a test or bench) decides each
//! expression's boolean result via [`set_matches`], and subscribed relays
//! fire on every transition. Handles are cached per raw expression, the
//! same way a real matcher caches its query lists.
//!
//! [`set_matches`]: InMemoryConditionSource::set_matches

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::{ConditionHandle, ConditionSource};
use crate::dispatcher::ChangeRelay;

struct MemoryHandle {
    matches: AtomicBool,
    relay: Mutex<Option<ChangeRelay>>,
}

impl MemoryHandle {
    fn new(matches: bool) -> Self {
        Self {
            matches: AtomicBool::new(matches),
            relay: Mutex::new(None),
        }
    }
}

impl ConditionHandle for MemoryHandle {
    fn matches(&self) -> bool {
        self.matches.load(Ordering::SeqCst)
    }

    fn subscribe(&self, relay: ChangeRelay) {
        if let Ok(mut slot) = self.relay.lock() {
            *slot = Some(relay);
        }
    }

    fn unsubscribe(&self) {
        if let Ok(mut slot) = self.relay.lock() {
            slot.take();
        }
    }
}

/// Condition source backed by host-controlled booleans.
#[derive(Default)]
pub struct InMemoryConditionSource {
    handles: Mutex<HashMap<String, Arc<MemoryHandle>>>,
}

impl InMemoryConditionSource {
    /// Creates an empty source; unknown expressions evaluate false.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an expression's result, firing the subscribed relay on transition.
    ///
    /// Creating the expression's handle on first use means results can be
    /// preset before anything watches them. Setting the value it already has
    /// is a no-op, matching platform matchers which only report transitions.
    pub fn set_matches(&self, expression: &str, matches: bool) {
        let handle = self.handle(expression);
        if handle.matches.swap(matches, Ordering::SeqCst) == matches {
            return;
        }

        let relay = handle.relay.lock().ok().and_then(|slot| slot.clone());
        if let Some(relay) = relay {
            relay.notify(matches);
        }
    }

    /// Current result for an expression; false if never set.
    #[must_use]
    pub fn matches(&self, expression: &str) -> bool {
        self.handle(expression).matches()
    }

    /// Returns true while a relay is subscribed for the expression.
    #[must_use]
    pub fn is_watched(&self, expression: &str) -> bool {
        self.handle(expression)
            .relay
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    fn handle(&self, expression: &str) -> Arc<MemoryHandle> {
        let Ok(mut handles) = self.handles.lock() else {
            return Arc::new(MemoryHandle::new(false));
        };
        Arc::clone(
            handles
                .entry(expression.to_string())
                .or_insert_with(|| Arc::new(MemoryHandle::new(false))),
        )
    }
}

impl ConditionSource for InMemoryConditionSource {
    fn watch(&self, expression: &str) -> Arc<dyn ConditionHandle> {
        self.handle(expression)
    }
}
