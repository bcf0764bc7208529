//! # Respond - condition-keyed callback dispatch
//!
//! Respond lets an application react to a boolean environmental condition
//! (a viewport/media condition) without re-polling it. Callers register
//! listeners (a condition expression, a namespace, and `match` / `no-match`
//! callbacks) and the engine guarantees that exactly one of the two fires
//! whenever the condition's result changes, plus once at startup via
//! [`Responder::ready`].
//!
//! ## Core Concepts
//!
//! - **Canonical key**: normalized form of a condition expression; equivalent
//!   spellings of a condition share one subscription
//! - **Subscription**: per-key record pairing the live condition handle with
//!   its ordered listener list
//! - **Listener**: caller registration unit, namespace plus callbacks
//! - **Capability**: injected probe result selecting the live or legacy
//!   (fallback-callback) dispatch branch
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use respond::{Capability, InMemoryConditionSource, Listener, Responder};
//!
//! let source = Arc::new(InMemoryConditionSource::new());
//! source.set_matches("(min-width: 700px)", true);
//!
//! let engine = Responder::new(source.clone(), Capability::Live);
//!
//! engine.register(
//!     Listener::builder()
//!         .namespace("nav")
//!         .expression("(min-width: 700px)")
//!         .on_match(|| println!("wide layout"))
//!         .on_no_match(|| println!("narrow layout"))
//!         .build()?,
//! )?;
//!
//! // One-time startup sync: the nav listener's on_match fires here.
//! engine.ready()?;
//!
//! // Later transitions fan out through the condition handle.
//! source.set_matches("(min-width: 700px)", false);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod condition;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod key;
pub mod listener;
pub mod registry;

// Re-export primary types at crate root for convenience
pub use condition::{Capability, ConditionHandle, ConditionSource, InMemoryConditionSource};
pub use dispatcher::{ChangeRelay, ConditionState};
pub use engine::Responder;
pub use error::{CallError, RespondError, RespondResult, ValidationError};
pub use key::{canonicalize, canonicalize_with, CanonicalKey};
pub use listener::{Callback, CallbackKind, Listener, ListenerBuilder, ListenerId, ListenerSnapshot};
pub use registry::SubscriptionSnapshot;
