//! Fan-out of condition results to registered listeners.
//!
//! Dispatch is planned under the registry lock (select callbacks, advance
//! subscription state, clear pending flags) and run after the lock is
//! released, so callbacks may re-enter the engine. The planned list is a
//! snapshot: listeners added or removed by a callback only affect later
//! fan-outs.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::key::CanonicalKey;
use crate::listener::{Callback, CallbackKind, ListenerId};
use crate::registry::{Registry, Subscription};

/// Evaluation state of a subscription's condition.
///
/// Every live change notification is a transition into `Matched` or
/// `NotMatched`; the first dispatch always sets a definite state. Legacy
/// dispatches carry no boolean result and leave the state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionState {
    /// No result has been observed yet.
    Unknown,
    /// The condition last evaluated true.
    Matched,
    /// The condition last evaluated false.
    NotMatched,
}

impl ConditionState {
    /// The state corresponding to a boolean condition result.
    #[must_use]
    pub const fn from_result(matches: bool) -> Self {
        if matches {
            Self::Matched
        } else {
            Self::NotMatched
        }
    }

    /// Returns true once a result has been observed.
    #[must_use]
    pub const fn is_definite(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl Default for ConditionState {
    fn default() -> Self {
        Self::Unknown
    }
}

impl fmt::Display for ConditionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Matched => write!(f, "matched"),
            Self::NotMatched => write!(f, "not_matched"),
        }
    }
}

/// How one fan-out selects callbacks.
#[derive(Debug, Clone, Copy)]
pub(crate) enum DispatchMode {
    /// Live result: match callbacks on true, no-match callbacks on false.
    Live(bool),
    /// No live evaluation: each listener's configured fallback fires.
    Legacy,
}

/// One callback selected for invocation.
pub(crate) struct PlannedCall {
    pub id: ListenerId,
    pub namespace: String,
    pub kind: CallbackKind,
    pub callback: Callback,
}

/// Selects callbacks for one subscription under the registry lock.
///
/// Listeners are visited in registration order, the only ordering the
/// engine guarantees. A listener whose namespace fails the filter is
/// skipped entirely; a listener lacking the selected callback is skipped
/// silently but still counts as dispatched for its pending flag.
pub(crate) fn plan_dispatch(
    sub: &mut Subscription,
    mode: DispatchMode,
    filter: Option<&str>,
) -> Vec<PlannedCall> {
    if let DispatchMode::Live(result) = mode {
        let next = ConditionState::from_result(result);
        if sub.state != next {
            sub.state = next;
            sub.last_transition = Some(Utc::now());
        }
    }

    let mut calls = Vec::new();
    for listener in &mut sub.listeners {
        if let Some(ns) = filter {
            if listener.namespace() != ns {
                continue;
            }
        }

        listener.clear_pending();

        let kind = match mode {
            DispatchMode::Live(result) => CallbackKind::for_result(result),
            DispatchMode::Legacy => listener.fallback(),
        };

        if let Some(callback) = listener.callback(kind) {
            calls.push(PlannedCall {
                id: listener.id(),
                namespace: listener.namespace().to_string(),
                kind,
                callback: Arc::clone(callback),
            });
        }
    }

    calls
}

/// Invokes a planned fan-out, in order.
pub(crate) fn run_calls(calls: Vec<PlannedCall>) {
    for call in calls {
        tracing::trace!(
            listener = %call.id,
            namespace = %call.namespace,
            kind = %call.kind,
            "invoking callback"
        );
        (call.callback)();
    }
}

/// Change-subscriber handed to a [`crate::ConditionHandle`] at creation.
///
/// The relay carries the canonical key it was created for, so a change
/// notification routes straight to its subscription; the expression string
/// a handle might echo back is never re-canonicalized. A relay outliving
/// its registry is a silent no-op.
#[derive(Debug, Clone)]
pub struct ChangeRelay {
    registry: Weak<Mutex<Registry>>,
    key: CanonicalKey,
}

impl ChangeRelay {
    pub(crate) fn new(registry: Weak<Mutex<Registry>>, key: CanonicalKey) -> Self {
        Self { registry, key }
    }

    /// The canonical key this relay reports for.
    #[must_use]
    pub fn key(&self) -> &CanonicalKey {
        &self.key
    }

    /// Reports a condition transition, fanning out to every listener
    /// registered under this relay's key.
    pub fn notify(&self, matches: bool) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };

        let calls = {
            let Ok(mut guard) = registry.lock() else {
                return;
            };
            match guard.subscription_mut(&self.key) {
                Some(sub) => plan_dispatch(sub, DispatchMode::Live(matches), None),
                None => Vec::new(),
            }
        };

        run_calls(calls);
    }
}
