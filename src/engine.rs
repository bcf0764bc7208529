//! The public facade over the registry and dispatcher.
//!
//! A [`Responder`] is an explicit, constructible engine value: the host
//! builds one per application instance with its condition source and
//! capability probe result, registers listeners, and calls [`Responder::ready`]
//! once after the initial registrations to synchronize everyone with the
//! current environment. There is no process-global state.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::condition::{Capability, ConditionSource};
use crate::dispatcher::{plan_dispatch, run_calls, DispatchMode, PlannedCall};
use crate::error::{CallError, RespondError, RespondResult};
use crate::key::CanonicalKey;
use crate::listener::{CallbackKind, Listener, ListenerSnapshot};
use crate::registry::{Registry, Subscription, SubscriptionSnapshot};

fn mode_for(sub: &Subscription) -> DispatchMode {
    match sub.current_result() {
        Some(result) => DispatchMode::Live(result),
        None => DispatchMode::Legacy,
    }
}

/// Condition-keyed callback registry and dispatch engine.
///
/// Cloning is cheap and yields a second facade over the same registry.
#[derive(Clone)]
pub struct Responder {
    inner: Arc<Mutex<Registry>>,
}

impl Responder {
    /// Creates an engine over the given condition source.
    ///
    /// The capability is the host's environment probe result, decided once:
    /// [`Capability::Legacy`] suppresses live handles entirely and routes
    /// every dispatch through each listener's fallback callback.
    #[must_use]
    pub fn new(source: Arc<dyn ConditionSource>, capability: Capability) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry::new(source, capability))),
        }
    }

    fn lock(&self) -> RespondResult<MutexGuard<'_, Registry>> {
        self.inner
            .lock()
            .map_err(|_| RespondError::internal("registry lock poisoned"))
    }

    /// The environment capability this engine was built with.
    #[must_use]
    pub fn capability(&self) -> Capability {
        self.inner
            .lock()
            .map_or(Capability::Legacy, |registry| registry.capability())
    }

    /// Registers a listener.
    ///
    /// Registering a namespace that already exists under the expression's
    /// canonical key is a silent no-op, so repeated registration cannot
    /// double-fire callbacks. Once the engine has been marked ready, a new
    /// listener is immediately dispatched the condition's current result so
    /// it is not out of sync until the next transition.
    ///
    /// # Errors
    /// Returns an internal error only if the registry lock is poisoned.
    pub fn register(&self, listener: Listener) -> RespondResult<()> {
        let calls = {
            let mut registry = self.lock()?;
            let key = CanonicalKey::from_raw(listener.expression());

            if registry.find_listener(Some(&key), listener.namespace()).is_some() {
                tracing::debug!(
                    namespace = listener.namespace(),
                    key = %key,
                    "duplicate registration ignored"
                );
                return Ok(());
            }

            let namespace = listener.namespace().to_string();
            tracing::debug!(namespace = %namespace, key = %key, "registered listener");

            let relay_registry = Arc::downgrade(&self.inner);
            let sub = registry.get_or_create(listener.expression(), relay_registry);
            sub.listeners.push(listener);

            if registry.ready {
                plan_for_key(&mut registry, &key, Some(&namespace))
            } else {
                Vec::new()
            }
        };

        run_calls(calls);
        Ok(())
    }

    /// Registers every listener in the sequence, in order.
    ///
    /// Flattens exactly one level; each element follows the same
    /// duplicate-registration rule as [`Responder::register`].
    ///
    /// # Errors
    /// Returns an internal error only if the registry lock is poisoned.
    pub fn register_all(
        &self,
        listeners: impl IntoIterator<Item = Listener>,
    ) -> RespondResult<()> {
        for listener in listeners {
            self.register(listener)?;
        }
        Ok(())
    }

    /// Marks the engine ready and dispatches every subscription's current
    /// result: the one-time startup sync after initial registrations.
    ///
    /// Calling it again re-dispatches every subscription.
    ///
    /// # Errors
    /// Returns an internal error only if the registry lock is poisoned.
    pub fn ready(&self) -> RespondResult<()> {
        let calls = {
            let mut registry = self.lock()?;
            registry.ready = true;

            let mut calls = Vec::new();
            for key in registry.keys() {
                calls.extend(plan_for_key(&mut registry, &key, None));
            }
            calls
        };

        run_calls(calls);
        Ok(())
    }

    /// Finds a listener by namespace, scoped to one expression when given.
    ///
    /// Cross-key scan order is undefined when no expression is supplied.
    #[must_use]
    pub fn retrieve(&self, namespace: &str, expression: Option<&str>) -> Option<ListenerSnapshot> {
        let registry = self.inner.lock().ok()?;
        let key = expression.map(CanonicalKey::from_raw);
        registry
            .find_listener(key.as_ref(), namespace)
            .map(Listener::snapshot)
    }

    /// The subscription registered for an expression's canonical key, if any.
    #[must_use]
    pub fn subscription(&self, expression: &str) -> Option<SubscriptionSnapshot> {
        let registry = self.inner.lock().ok()?;
        registry.get(expression).map(Subscription::snapshot)
    }

    /// A view of every subscription, for debugging and introspection.
    /// Order across keys is undefined.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SubscriptionSnapshot> {
        self.inner
            .lock()
            .map(|registry| registry.snapshots())
            .unwrap_or_default()
    }

    /// Removes an expression's whole subscription: the live handle is
    /// unsubscribed and every listener under the key is discarded.
    ///
    /// Returns whether a subscription actually existed; removing a missing
    /// key is a silent no-op.
    pub fn remove_key(&self, expression: &str) -> bool {
        self.inner
            .lock()
            .map(|mut registry| registry.remove_key(expression))
            .unwrap_or(false)
    }

    /// Removes the namespace's listener from the expression's subscription,
    /// leaving the subscription (and its live handle) in place.
    ///
    /// Returns whether a listener was removed.
    pub fn remove_listener(&self, expression: &str, namespace: &str) -> bool {
        self.inner
            .lock()
            .map(|mut registry| registry.remove_listener(expression, namespace))
            .unwrap_or(false)
    }

    /// Invokes a named listener's callback, or re-dispatches its subscription.
    ///
    /// - With `method` and `expression`: runs that callback on the listener
    ///   at exactly that namespace and key.
    /// - With only `method`: runs it on the first listener matching the
    ///   namespace anywhere in the registry.
    /// - Without `method`: re-runs the subscription's dispatch for the
    ///   namespace using the condition's current result (scoped to the
    ///   expression's key when one is given).
    ///
    /// # Errors
    /// [`CallError::ListenerNotFound`] / [`CallError::ListenerNotFoundAtKey`]
    /// when the namespace has no listener, [`CallError::CallbackMissing`]
    /// when the listener lacks the requested callback. Failures are also
    /// reported to the log sink; they never panic.
    pub fn call(
        &self,
        namespace: &str,
        method: Option<CallbackKind>,
        expression: Option<&str>,
    ) -> RespondResult<()> {
        let result = self.call_inner(namespace, method, expression);
        if let Err(err) = &result {
            tracing::warn!(namespace, error = %err, "call failed");
        }
        result
    }

    fn call_inner(
        &self,
        namespace: &str,
        method: Option<CallbackKind>,
        expression: Option<&str>,
    ) -> RespondResult<()> {
        let calls = {
            let mut registry = self.lock()?;
            let key = expression.map(CanonicalKey::from_raw);

            match method {
                Some(kind) => {
                    let listener = registry
                        .find_listener(key.as_ref(), namespace)
                        .ok_or_else(|| not_found(namespace, key.clone()))?;
                    let callback = listener
                        .callback(kind)
                        .cloned()
                        .ok_or_else(|| CallError::CallbackMissing {
                            namespace: namespace.to_string(),
                            kind,
                        })?;
                    vec![PlannedCall {
                        id: listener.id(),
                        namespace: namespace.to_string(),
                        kind,
                        callback,
                    }]
                }
                None => {
                    let owner = registry
                        .find_owner_key(key.as_ref(), namespace)
                        .cloned()
                        .ok_or_else(|| not_found(namespace, key.clone()))?;
                    plan_for_key(&mut registry, &owner, Some(namespace))
                }
            }
        };

        run_calls(calls);
        Ok(())
    }

}

/// Plans one subscription's fan-out from its current result.
fn plan_for_key(
    registry: &mut Registry,
    key: &CanonicalKey,
    filter: Option<&str>,
) -> Vec<PlannedCall> {
    match registry.subscription_mut(key) {
        Some(sub) => {
            let mode = mode_for(sub);
            plan_dispatch(sub, mode, filter)
        }
        None => Vec::new(),
    }
}

fn not_found(namespace: &str, key: Option<CanonicalKey>) -> CallError {
    match key {
        Some(key) => CallError::ListenerNotFoundAtKey {
            namespace: namespace.to_string(),
            key,
        },
        None => CallError::ListenerNotFound {
            namespace: namespace.to_string(),
        },
    }
}
