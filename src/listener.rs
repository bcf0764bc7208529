//! Listener descriptors, the caller-facing registration unit.
//!
//! A listener names a condition expression, a namespace that identifies it
//! within that condition's subscription, and up to two zero-argument
//! callbacks. Exactly one of the two fires per condition transition; a
//! missing callback is valid and is silently skipped at dispatch time.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Zero-argument callback stored on a listener.
///
/// Callbacks are shared `Fn` values: dispatch clones the `Arc` into a
/// snapshot before invoking, so a callback may freely re-enter the engine.
pub type Callback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Unique identifier for a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(Uuid);

impl ListenerId {
    /// Creates a new random listener id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which of a listener's two callbacks is meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackKind {
    /// The callback fired when the condition evaluates true.
    Match,
    /// The callback fired when the condition evaluates false.
    NoMatch,
}

impl CallbackKind {
    /// Selects the kind that corresponds to a boolean condition result.
    #[must_use]
    pub const fn for_result(matches: bool) -> Self {
        if matches {
            Self::Match
        } else {
            Self::NoMatch
        }
    }
}

impl Default for CallbackKind {
    fn default() -> Self {
        Self::Match
    }
}

impl fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Match => write!(f, "match"),
            Self::NoMatch => write!(f, "no_match"),
        }
    }
}

/// A registered (or registrable) listener.
///
/// Built via [`Listener::builder`], which validates the namespace and
/// condition expression up front instead of accepting malformed input.
///
/// # Examples
///
/// ```rust,ignore
/// use respond::{CallbackKind, Listener};
///
/// let listener = Listener::builder()
///     .namespace("nav")
///     .expression("(min-width: 700px)")
///     .on_match(|| println!("wide"))
///     .on_no_match(|| println!("narrow"))
///     .fallback(CallbackKind::NoMatch)
///     .build()?;
/// ```
pub struct Listener {
    id: ListenerId,
    namespace: String,
    expression: String,
    on_match: Option<Callback>,
    on_no_match: Option<Callback>,
    fallback: CallbackKind,
    pending_initial: bool,
    registered_at: DateTime<Utc>,
}

impl Listener {
    /// Creates a new listener builder.
    #[must_use]
    pub fn builder() -> ListenerBuilder {
        ListenerBuilder::new()
    }

    /// The listener's id.
    #[must_use]
    pub const fn id(&self) -> ListenerId {
        self.id
    }

    /// The namespace identifying this listener within its subscription.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The raw condition expression this listener was registered against.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Which callback fires in the legacy environment.
    #[must_use]
    pub const fn fallback(&self) -> CallbackKind {
        self.fallback
    }

    /// Returns true until the listener's first dispatch has run.
    #[must_use]
    pub const fn is_pending_initial(&self) -> bool {
        self.pending_initial
    }

    /// Returns true if the listener carries a callback of the given kind.
    #[must_use]
    pub fn has_callback(&self, kind: CallbackKind) -> bool {
        self.callback(kind).is_some()
    }

    pub(crate) fn callback(&self, kind: CallbackKind) -> Option<&Callback> {
        match kind {
            CallbackKind::Match => self.on_match.as_ref(),
            CallbackKind::NoMatch => self.on_no_match.as_ref(),
        }
    }

    pub(crate) fn clear_pending(&mut self) {
        self.pending_initial = false;
    }

    /// A serializable view of this listener.
    #[must_use]
    pub fn snapshot(&self) -> ListenerSnapshot {
        ListenerSnapshot {
            id: self.id,
            namespace: self.namespace.clone(),
            expression: self.expression.clone(),
            fallback: self.fallback,
            has_on_match: self.on_match.is_some(),
            has_on_no_match: self.on_no_match.is_some(),
            pending_initial: self.pending_initial,
            registered_at: self.registered_at,
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("namespace", &self.namespace)
            .field("expression", &self.expression)
            .field("on_match", &self.on_match.is_some())
            .field("on_no_match", &self.on_no_match.is_some())
            .field("fallback", &self.fallback)
            .field("pending_initial", &self.pending_initial)
            .finish()
    }
}

/// Serializable view of a registered listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerSnapshot {
    /// Listener id.
    pub id: ListenerId,
    /// Namespace within the subscription.
    pub namespace: String,
    /// Raw condition expression.
    pub expression: String,
    /// Legacy-environment callback selection.
    pub fallback: CallbackKind,
    /// Whether a match callback is present.
    pub has_on_match: bool,
    /// Whether a no-match callback is present.
    pub has_on_no_match: bool,
    /// Whether the listener has not yet been dispatched.
    pub pending_initial: bool,
    /// When the listener was built.
    pub registered_at: DateTime<Utc>,
}

/// Builder for [`Listener`].
#[derive(Default)]
pub struct ListenerBuilder {
    namespace: Option<String>,
    expression: Option<String>,
    on_match: Option<Callback>,
    on_no_match: Option<Callback>,
    fallback: Option<CallbackKind>,
}

impl ListenerBuilder {
    /// Creates a new listener builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the namespace (required, non-empty).
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets the condition expression (required, non-empty).
    #[must_use]
    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    /// Sets the callback fired when the condition evaluates true.
    #[must_use]
    pub fn on_match(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_match = Some(Arc::new(callback));
        self
    }

    /// Sets the callback fired when the condition evaluates false.
    #[must_use]
    pub fn on_no_match(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_no_match = Some(Arc::new(callback));
        self
    }

    /// Sets which callback fires in the legacy environment (defaults to match).
    #[must_use]
    pub fn fallback(mut self, kind: CallbackKind) -> Self {
        self.fallback = Some(kind);
        self
    }

    /// Builds the listener, validating required fields.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] when the namespace or expression is
    /// missing or empty. Callbacks are optional; a listener with neither is
    /// legal and simply never fires.
    pub fn build(self) -> Result<Listener, ValidationError> {
        let namespace = self.namespace.ok_or(ValidationError::MissingField {
            field: "namespace".to_string(),
        })?;
        if namespace.is_empty() {
            return Err(ValidationError::EmptyNamespace);
        }

        let expression = self.expression.ok_or(ValidationError::MissingField {
            field: "expression".to_string(),
        })?;
        if expression.is_empty() {
            return Err(ValidationError::EmptyExpression);
        }

        Ok(Listener {
            id: ListenerId::new(),
            namespace,
            expression,
            on_match: self.on_match,
            on_no_match: self.on_no_match,
            fallback: self.fallback.unwrap_or_default(),
            pending_initial: true,
            registered_at: Utc::now(),
        })
    }
}
