//! Canonical keys for condition expressions.
//!
//! Raw condition strings arrive in whatever shape the caller wrote them.
//! The registry indexes subscriptions by a normalized form so that
//! `"(min-width: 700px)"` and `"(MIN-WIDTH:700px)"` share one subscription.
//!
//! Canonicalization is a total, pure function: lowercase the input, fold
//! runs of whitespace, hyphens, colons, and parentheses into a single
//! replacement character, collapse runs of the replacement character itself,
//! and strip one trailing replacement character. It is idempotent:
//! `canonicalize(canonicalize(s)) == canonicalize(s)`.
//!
//! Note that two expressions a human reads as "the same condition with the
//! clauses reordered" do *not* canonicalize identically. The engine never
//! relies on re-canonicalizing an expression echoed back by the platform;
//! the canonical key always travels on the change relay instead.

use std::fmt;
use std::sync::OnceLock;

use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};

/// Replacement character used when none is supplied.
pub const DEFAULT_REPLACEMENT: char = '_';

static SEPARATOR_RUNS: OnceLock<Regex> = OnceLock::new();

fn separator_runs() -> &'static Regex {
    SEPARATOR_RUNS.get_or_init(|| {
        Regex::new(r"[\s\-:()]+").expect("separator class is a valid pattern")
    })
}

fn replacement_runs(replacement: char) -> Regex {
    static UNDERSCORE_RUNS: OnceLock<Regex> = OnceLock::new();

    if replacement == DEFAULT_REPLACEMENT {
        return UNDERSCORE_RUNS
            .get_or_init(|| Regex::new("_{2,}").expect("underscore run is a valid pattern"))
            .clone();
    }

    let escaped = regex::escape(&replacement.to_string());
    Regex::new(&format!("{escaped}{{2,}}")).expect("escaped literal is a valid pattern")
}

/// Canonicalizes a raw condition expression with the default `'_'` replacement.
#[must_use]
pub fn canonicalize(raw: &str) -> String {
    canonicalize_with(raw, DEFAULT_REPLACEMENT)
}

/// Canonicalizes a raw condition expression using the given replacement character.
#[must_use]
pub fn canonicalize_with(raw: &str, replacement: char) -> String {
    let lowered = raw.to_lowercase();
    let rep = replacement.to_string();

    // NoExpand keeps unusual replacement characters (e.g. '$') literal.
    let folded = separator_runs().replace_all(&lowered, NoExpand(rep.as_str()));
    let collapsed = replacement_runs(replacement).replace_all(folded.as_ref(), NoExpand(rep.as_str()));

    collapsed
        .strip_suffix(replacement)
        .unwrap_or(collapsed.as_ref())
        .to_string()
}

/// Normalized registry key for a condition expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// Canonicalizes a raw expression into a key.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        Self(canonicalize(raw))
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
