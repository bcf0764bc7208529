//! Error types for the respond engine.
//!
//! All errors are strongly typed using thiserror. Missing keys and unknown
//! namespaces are deliberately *not* errors anywhere in the engine: lookups
//! return `Option` and removals report a boolean. Errors are reserved for
//! rejected input and failed targeted invocations.

use thiserror::Error;

use crate::key::CanonicalKey;
use crate::listener::CallbackKind;

/// Validation errors that occur while constructing a listener.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Namespace cannot be empty")]
    EmptyNamespace,

    #[error("Condition expression cannot be empty")]
    EmptyExpression,
}

/// Errors from targeted callback invocation via [`crate::Responder::call`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("No listener registered for namespace '{namespace}'")]
    ListenerNotFound {
        namespace: String,
    },

    #[error("No listener for namespace '{namespace}' under key '{key}'")]
    ListenerNotFoundAtKey {
        namespace: String,
        key: CanonicalKey,
    },

    #[error("Listener '{namespace}' has no {kind} callback")]
    CallbackMissing {
        namespace: String,
        kind: CallbackKind,
    },
}

/// Top-level error type for the respond engine.
#[derive(Debug, Error)]
pub enum RespondError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Call error: {0}")]
    Call(#[from] CallError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl RespondError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a call error.
    #[must_use]
    pub const fn is_call(&self) -> bool {
        matches!(self, Self::Call(_))
    }

    /// Returns true if this error means the lookup target did not exist,
    /// as opposed to an invocation target that could not run.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Call(CallError::ListenerNotFound { .. } | CallError::ListenerNotFoundAtKey { .. })
        )
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for respond operations.
pub type RespondResult<T> = Result<T, RespondError>;
