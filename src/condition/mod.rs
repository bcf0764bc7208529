//! External condition-evaluation primitive.
//!
//! The engine never evaluates condition expressions itself. A host supplies
//! a [`ConditionSource`] (the platform's media matcher, or the in-memory
//! implementation in [`memory`]) and a [`Capability`] probe result decided
//! once at startup. Everything the engine knows about a condition flows
//! through the [`ConditionHandle`] it gets back.

/// In-memory condition source for tests, benches, and headless hosts.
pub mod memory;

pub use memory::InMemoryConditionSource;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dispatcher::ChangeRelay;

/// Whether the environment supports live change notification.
///
/// Probed once by the host and injected into the engine; it must stay
/// stable for the engine's lifetime. `Legacy` selects the fallback dispatch
/// branch and suppresses handle creation entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Live handles with change subscription are available.
    Live,
    /// No live evaluation; listeners fire their configured fallback callback.
    Legacy,
}

impl Capability {
    /// Returns true when live change notification is available.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }
}

/// A live handle over one condition expression.
///
/// Handles are created once per canonical key and cached for the key's
/// lifetime. `subscribe` is called exactly once, at creation, with the
/// relay that routes change notifications back into the registry.
///
/// Implementations must not invoke the relay synchronously from inside
/// `subscribe` or `unsubscribe`; notifications fire on later transitions.
pub trait ConditionHandle: Send + Sync {
    /// Current boolean result of the condition.
    fn matches(&self) -> bool;

    /// Registers the engine's change relay with this handle.
    fn subscribe(&self, relay: ChangeRelay);

    /// Detaches the change relay; further transitions are not reported.
    fn unsubscribe(&self);
}

/// Factory for [`ConditionHandle`]s.
///
/// `watch` receives the raw expression exactly as the caller wrote it.
/// Canonicalization is registry business, and some platforms echo composite
/// expressions back with clauses reordered, which is why the engine never
/// maps a handle back to its key through the expression string.
pub trait ConditionSource: Send + Sync {
    /// Returns a live handle evaluating the given expression.
    fn watch(&self, expression: &str) -> Arc<dyn ConditionHandle>;
}
