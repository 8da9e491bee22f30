//! Deduplication result types.

use crate::models::Signature;
use serde::{Deserialize, Serialize};

/// Result of a deduplication check.
///
/// # Example
///
/// ```rust
/// use quizpool::Signature;
/// use quizpool::services::deduplication::{DuplicateCheckResult, DuplicateReason};
///
/// let result = DuplicateCheckResult::duplicate(
///     DuplicateReason::Session,
///     Signature::new(0xff),
///     1,
///     0,
/// );
/// assert!(result.is_duplicate);
/// assert_eq!(result.distance, Some(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCheckResult {
    /// Whether the signature is a duplicate.
    pub is_duplicate: bool,

    /// Which history matched.
    pub reason: Option<DuplicateReason>,

    /// The closest recorded signature within the threshold.
    pub matched: Option<Signature>,

    /// Hamming distance to `matched`.
    pub distance: Option<u32>,

    /// Duration of the check in milliseconds.
    pub check_duration_ms: u64,
}

impl DuplicateCheckResult {
    /// Creates a result indicating no duplicate was found.
    #[must_use]
    pub const fn not_duplicate(duration_ms: u64) -> Self {
        Self {
            is_duplicate: false,
            reason: None,
            matched: None,
            distance: None,
            check_duration_ms: duration_ms,
        }
    }

    /// Creates a result for a match against recorded history.
    #[must_use]
    pub const fn duplicate(
        reason: DuplicateReason,
        matched: Signature,
        distance: u32,
        duration_ms: u64,
    ) -> Self {
        Self {
            is_duplicate: true,
            reason: Some(reason),
            matched: Some(matched),
            distance: Some(distance),
            check_duration_ms: duration_ms,
        }
    }
}

impl Default for DuplicateCheckResult {
    fn default() -> Self {
        Self::not_duplicate(0)
    }
}

/// Which history a duplicate was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateReason {
    /// Admitted earlier in this process (resident or already served).
    Session,

    /// Present in the persisted fingerprint store.
    Persisted,
}

impl DuplicateReason {
    /// Returns the reason as a metric label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Persisted => "persisted",
        }
    }
}

impl std::fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_duplicate_result() {
        let result = DuplicateCheckResult::not_duplicate(10);
        assert!(!result.is_duplicate);
        assert!(result.reason.is_none());
        assert!(result.matched.is_none());
        assert_eq!(result.check_duration_ms, 10);
    }

    #[test]
    fn test_duplicate_result() {
        let result =
            DuplicateCheckResult::duplicate(DuplicateReason::Persisted, Signature::new(9), 2, 3);
        assert!(result.is_duplicate);
        assert_eq!(result.reason, Some(DuplicateReason::Persisted));
        assert_eq!(result.matched, Some(Signature::new(9)));
    }

    #[test]
    fn test_duplicate_reason_display() {
        assert_eq!(DuplicateReason::Session.to_string(), "session");
        assert_eq!(DuplicateReason::Persisted.to_string(), "persisted");
    }
}
