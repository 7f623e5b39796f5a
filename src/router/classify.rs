//! Segment classification: the fallback protocol behind typed wildcards.
//!
//! When a request segment has no literal child at the current trie node, the search
//! cursor asks a classifier for wildcard keys to try instead. The default classifier
//! walks an explicit, ordered list of stages:
//!
//! | Attempt | Stage        | Candidate                                        |
//! |---------|--------------|--------------------------------------------------|
//! | 1       | typed check  | `{digits}`, `{float}` or `{bool}`, or nothing    |
//! | 2       | generic      | `{string}`                                       |
//! | 3+      | —            | [`ClassifierExhausted`]                          |
//!
//! Numeric-looking input therefore prefers `{digits}` over `{string}` whenever both are
//! registered at the same depth.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Signal that a classifier has no further candidates for a segment.
///
/// Internal to the search loop: the cursor turns it into a backtrack step or a clean
/// "no match" and never hands it to callers of [`Router::lookup`](super::Router::lookup).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no further wildcard candidates for this segment")]
pub struct ClassifierExhausted;

/// Outcome of one classification attempt.
///
/// - `Ok(Some(key))`: try `key` as a child of the current node.
/// - `Ok(None)`: this attempt produced nothing; move on to the next one.
/// - `Err(ClassifierExhausted)`: stop, the segment has no candidates left.
pub type ClassifyResult = Result<Option<Cow<'static, str>>, ClassifierExhausted>;

/// A shareable classifier function.
///
/// Receives the literal segment text and a 1-based attempt index. Implementations
/// must eventually return [`ClassifierExhausted`] for growing attempt indices.
pub type Classifier = Arc<dyn Fn(&str, usize) -> ClassifyResult + Send + Sync + 'static>;

/// The family of a typed wildcard segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WildcardKind {
    /// Integral values, `{digits}`.
    Digits,
    /// Floating-point values, `{float}`.
    Float,
    /// `true` / `false` in any letter case, `{bool}`.
    Bool,
    /// Any segment at all, `{string}`.
    String,
}

impl WildcardKind {
    /// Every kind, in default precedence order.
    pub const ALL: [WildcardKind; 4] = [Self::Digits, Self::Float, Self::Bool, Self::String];

    /// The reserved trie key registered for this kind.
    pub fn token(self) -> &'static str {
        match self {
            Self::Digits => "{digits}",
            Self::Float => "{float}",
            Self::Bool => "{bool}",
            Self::String => "{string}",
        }
    }

    /// Maps a reserved trie key back to its kind.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.token() == token)
    }

    /// Returns `true` if `segment` is one of the reserved wildcard keys.
    pub fn is_token(segment: &str) -> bool {
        Self::from_token(segment).is_some()
    }
}

impl fmt::Display for WildcardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

// One entry of the default candidate list.
type Stage = fn(&str) -> Option<WildcardKind>;

// Walking off the end of this list is what exhausts a segment.
const STAGES: [Stage; 2] = [typed_stage, generic_stage];

/// The default classifier.
///
/// `attempt` is 1-based: attempt 1 runs the typed check, attempt 2 offers `{string}`,
/// anything outside the stage list is exhausted.
///
/// # Examples
///
/// ```
/// use waypath::router::classify;
///
/// assert_eq!(classify("42", 1).unwrap().as_deref(), Some("{digits}"));
/// assert_eq!(classify("42.5", 1).unwrap().as_deref(), Some("{float}"));
/// assert_eq!(classify("hello", 1).unwrap(), None);
/// assert_eq!(classify("hello", 2).unwrap().as_deref(), Some("{string}"));
/// assert!(classify("hello", 3).is_err());
/// ```
pub fn classify(text: &str, attempt: usize) -> ClassifyResult {
    let stage = attempt
        .checked_sub(1)
        .and_then(|index| STAGES.get(index))
        .ok_or(ClassifierExhausted)?;
    Ok(stage(text).map(|kind| Cow::Borrowed(kind.token())))
}

/// Returns the default classifier as a shareable [`Classifier`].
pub fn default_classifier() -> Classifier {
    Arc::new(classify)
}

// Numeric and boolean interpretations, in precedence order.
fn typed_stage(text: &str) -> Option<WildcardKind> {
    if is_integral(text) {
        return Some(WildcardKind::Digits);
    }
    if text.parse::<f64>().is_ok() {
        return Some(WildcardKind::Float);
    }
    if text.eq_ignore_ascii_case("true") || text.eq_ignore_ascii_case("false") {
        return Some(WildcardKind::Bool);
    }
    None
}

fn generic_stage(_: &str) -> Option<WildcardKind> {
    Some(WildcardKind::String)
}

// Integer text whose float reading agrees, or float text with no fractional part.
fn is_integral(text: &str) -> bool {
    let Ok(float) = text.parse::<f64>() else {
        return false;
    };
    match text.parse::<i64>() {
        Ok(int) => int as f64 == float,
        Err(_) => {
            float.is_finite()
                && float.fract() == 0.0
                && float >= i64::MIN as f64
                && float < i64::MAX as f64
        }
    }
}
