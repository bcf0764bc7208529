//! Canonical-key subscription registry.
//!
//! One [`Subscription`] exists per canonical key at any time. Creation is
//! lazy (first registration against the key), and the live condition handle
//! created for a key is cached for the key's remaining lifetime; an empty
//! listener list keeps its subscription and handle. Entries die only by
//! explicit removal.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::condition::{Capability, ConditionHandle, ConditionSource};
use crate::dispatcher::{ChangeRelay, ConditionState};
use crate::key::CanonicalKey;
use crate::listener::{Listener, ListenerSnapshot};

/// Per-canonical-key record: the live condition handle plus its ordered
/// listener list.
pub(crate) struct Subscription {
    pub(crate) key: CanonicalKey,
    pub(crate) expression: String,
    pub(crate) handle: Option<Arc<dyn ConditionHandle>>,
    pub(crate) listeners: Vec<Listener>,
    pub(crate) state: ConditionState,
    pub(crate) last_transition: Option<DateTime<Utc>>,
}

impl Subscription {
    fn new(key: CanonicalKey, expression: String, handle: Option<Arc<dyn ConditionHandle>>) -> Self {
        Self {
            key,
            expression,
            handle,
            listeners: Vec::new(),
            state: ConditionState::Unknown,
            last_transition: None,
        }
    }

    /// A subscription with no live handle (legacy environment).
    pub(crate) fn detached(key: CanonicalKey, expression: String) -> Self {
        Self::new(key, expression, None)
    }

    /// Current handle result; `None` in the legacy environment.
    pub(crate) fn current_result(&self) -> Option<bool> {
        self.handle.as_ref().map(|handle| handle.matches())
    }

    pub(crate) fn snapshot(&self) -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            key: self.key.clone(),
            expression: self.expression.clone(),
            live: self.handle.is_some(),
            state: self.state,
            last_transition: self.last_transition,
            listeners: self.listeners.iter().map(Listener::snapshot).collect(),
        }
    }
}

/// Serializable view of one subscription.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionSnapshot {
    /// Canonical registry key.
    pub key: CanonicalKey,
    /// Raw expression that created the subscription.
    pub expression: String,
    /// Whether a live condition handle is attached.
    pub live: bool,
    /// Last observed evaluation state.
    pub state: ConditionState,
    /// When the state last changed.
    pub last_transition: Option<DateTime<Utc>>,
    /// Registered listeners, in registration order.
    pub listeners: Vec<ListenerSnapshot>,
}

/// Mapping from canonical key to subscription, plus the injected
/// environment collaborators.
pub(crate) struct Registry {
    source: Arc<dyn ConditionSource>,
    capability: Capability,
    pub(crate) ready: bool,
    subscriptions: HashMap<CanonicalKey, Subscription>,
}

impl Registry {
    pub(crate) fn new(source: Arc<dyn ConditionSource>, capability: Capability) -> Self {
        Self {
            source,
            capability,
            ready: false,
            subscriptions: HashMap::new(),
        }
    }

    pub(crate) const fn capability(&self) -> Capability {
        self.capability
    }

    /// Returns the subscription for the expression's canonical key, creating
    /// it on first use.
    ///
    /// Creation watches the *raw* expression and subscribes the change relay
    /// exactly once; the relay carries the canonical key so notifications
    /// route back here without consulting the handle's expression.
    pub(crate) fn get_or_create(
        &mut self,
        expression: &str,
        registry: Weak<Mutex<Registry>>,
    ) -> &mut Subscription {
        let key = CanonicalKey::from_raw(expression);

        if !self.subscriptions.contains_key(&key) {
            let sub = match self.capability {
                Capability::Live => {
                    let handle = self.source.watch(expression);
                    handle.subscribe(ChangeRelay::new(registry, key.clone()));
                    Subscription::new(key.clone(), expression.to_string(), Some(handle))
                }
                Capability::Legacy => Subscription::detached(key.clone(), expression.to_string()),
            };
            tracing::debug!(key = %key, live = sub.handle.is_some(), "created subscription");
            self.subscriptions.insert(key.clone(), sub);
        }

        self.subscriptions
            .get_mut(&key)
            .expect("subscription present after insert")
    }

    pub(crate) fn get(&self, expression: &str) -> Option<&Subscription> {
        self.subscriptions.get(&CanonicalKey::from_raw(expression))
    }

    pub(crate) fn subscription_mut(&mut self, key: &CanonicalKey) -> Option<&mut Subscription> {
        self.subscriptions.get_mut(key)
    }

    pub(crate) fn keys(&self) -> Vec<CanonicalKey> {
        self.subscriptions.keys().cloned().collect()
    }

    /// Removes the whole subscription for a key, discarding its listeners
    /// and unsubscribing from the live handle. Missing keys are a no-op.
    pub(crate) fn remove_key(&mut self, expression: &str) -> bool {
        let key = CanonicalKey::from_raw(expression);
        match self.subscriptions.remove(&key) {
            Some(sub) => {
                if let Some(handle) = &sub.handle {
                    handle.unsubscribe();
                }
                tracing::debug!(key = %key, listeners = sub.listeners.len(), "removed subscription");
                true
            }
            None => false,
        }
    }

    /// Removes every listener with the given namespace from the key's
    /// subscription. The subscription itself survives, possibly empty.
    pub(crate) fn remove_listener(&mut self, expression: &str, namespace: &str) -> bool {
        let key = CanonicalKey::from_raw(expression);
        let Some(sub) = self.subscriptions.get_mut(&key) else {
            return false;
        };

        let before = sub.listeners.len();
        sub.listeners.retain(|listener| listener.namespace() != namespace);
        let removed = sub.listeners.len() != before;
        if removed {
            tracing::debug!(key = %key, namespace, "removed listener");
        }
        removed
    }

    /// Finds a listener by namespace, within one key or across all of them.
    ///
    /// Cross-key scan order is undefined; namespace uniqueness within a key
    /// is a registration-time invariant, so a scoped lookup has at most one
    /// hit.
    pub(crate) fn find_listener(
        &self,
        key: Option<&CanonicalKey>,
        namespace: &str,
    ) -> Option<&Listener> {
        match key {
            Some(key) => self
                .subscriptions
                .get(key)?
                .listeners
                .iter()
                .find(|listener| listener.namespace() == namespace),
            None => self
                .subscriptions
                .values()
                .flat_map(|sub| sub.listeners.iter())
                .find(|listener| listener.namespace() == namespace),
        }
    }

    /// The canonical key of the subscription holding a namespace's listener.
    pub(crate) fn find_owner_key(
        &self,
        key: Option<&CanonicalKey>,
        namespace: &str,
    ) -> Option<&CanonicalKey> {
        let owns = |sub: &Subscription| {
            sub.listeners
                .iter()
                .any(|listener| listener.namespace() == namespace)
        };
        match key {
            Some(key) => {
                let sub = self.subscriptions.get(key)?;
                owns(sub).then_some(&sub.key)
            }
            None => self.subscriptions.values().find(|sub| owns(sub)).map(|sub| &sub.key),
        }
    }

    pub(crate) fn snapshots(&self) -> Vec<SubscriptionSnapshot> {
        self.subscriptions.values().map(Subscription::snapshot).collect()
    }
}
