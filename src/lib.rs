//! # quizpool
//!
//! Adaptive content pool engine for quiz-style items.
//!
//! Keeps a bounded, steadily replenished queue of items per category so a
//! consumer gets an item immediately instead of waiting on a slow generative
//! backend.
//!
//! ## Features
//!
//! - One bounded FIFO pool per category with a low-water mark
//! - Background replenishment from an ordered list of sources
//!   (local catalog first, LLM-backed generator second)
//! - SimHash near-duplicate detection against session and persisted history
//! - Feedback-driven difficulty controller, one step at a time
//!
//! ## Example
//!
//! ```rust,ignore
//! use quizpool::{CategorySpec, ContentEngine, QuizPoolConfig};
//!
//! let engine = ContentEngine::builder(QuizPoolConfig::default())
//!     .with_source(catalog)
//!     .with_source(generator)
//!     .with_store(store)
//!     .build();
//! engine.start(vec![CategorySpec::new("history")], 10, 3)?;
//!
//! if let Some(item) = engine.get_item("history") {
//!     let state = engine.submit_result("history", &item, true, 4_200)?;
//!     println!("next level: {}", state.level);
//! }
//! engine.stop().await;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod llm;
pub mod models;
pub mod observability;
pub mod services;
pub mod sources;
pub mod storage;

pub use config::{CategorySpec, QuizPoolConfig};
pub use llm::LlmProvider;
pub use models::{
    ContentItem, DifficultyLevel, DifficultyState, PerformanceSample, Provenance, Signature,
};
pub use services::{ContentEngine, DeduplicationService, DifficultyController};
pub use sources::{ContentSource, GenerativeSource, LocalCatalogSource, SourceRequest};
pub use storage::{FilesystemFingerprintStore, FingerprintStore, MemoryFingerprintStore};

/// Error type for quizpool operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Bad configuration, unknown category, malformed catalog rows |
/// | `OperationFailed` | I/O errors, HTTP failures, runtime problems |
/// | `SourceUnavailable` | A source cannot serve the request (empty, wrong difficulty, backend down) |
/// | `SourceTimeout` | A source call exceeded its time budget |
/// | `MalformedResponse` | Generated output could not be parsed into an item |
/// | `DuplicateRejected` | A candidate was too close to an already admitted item |
/// | `StoreCorruption` | The persisted fingerprint store could not be decoded |
///
/// None of these are fatal to the engine: the replenisher logs them and
/// moves on, and `get_item` never returns an error.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A content source could not produce a candidate.
    ///
    /// Raised when:
    /// - The local catalog has no rows for the category
    /// - The catalog has no rows at the requested difficulty (strict requests)
    /// - The generative backend is unreachable, misconfigured or its breaker is open
    #[error("source '{source_name}' unavailable: {cause}")]
    SourceUnavailable {
        /// Name of the source.
        source_name: String,
        /// Why it could not serve the request.
        cause: String,
    },

    /// A content source exceeded its time budget.
    #[error("source '{source_name}' timed out after {timeout_ms}ms")]
    SourceTimeout {
        /// Name of the source.
        source_name: String,
        /// The budget that was exceeded.
        timeout_ms: u64,
    },

    /// A source returned output that could not be turned into an item.
    #[error("malformed response from '{source_name}': {cause}")]
    MalformedResponse {
        /// Name of the source.
        source_name: String,
        /// Parse failure detail.
        cause: String,
    },

    /// A candidate was rejected as a near-duplicate.
    #[error("duplicate rejected: signature {signature}")]
    DuplicateRejected {
        /// Hex signature of the rejected candidate.
        signature: String,
    },

    /// The persisted fingerprint store is unreadable.
    #[error("fingerprint store '{path}' is corrupt: {cause}")]
    StoreCorruption {
        /// Location of the store.
        path: String,
        /// Decode failure detail.
        cause: String,
    },
}

impl Error {
    /// Whether another attempt against the same source may succeed.
    ///
    /// Timeouts, malformed output and duplicate rejections are retried
    /// with a different topic; an unavailable source is skipped.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SourceTimeout { .. }
                | Self::MalformedResponse { .. }
                | Self::DuplicateRejected { .. }
        )
    }
}

/// Result type alias for quizpool operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
///
/// ```rust
/// let ts = quizpool::current_timestamp();
/// assert!(ts > 0);
/// ```
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("test error".to_string());
        assert_eq!(err.to_string(), "invalid input: test error");

        let err = Error::OperationFailed {
            operation: "test".to_string(),
            cause: "failed".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'test' failed: failed");

        let err = Error::SourceTimeout {
            source_name: "generative".to_string(),
            timeout_ms: 10_000,
        };
        assert_eq!(
            err.to_string(),
            "source 'generative' timed out after 10000ms"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(
            Error::SourceTimeout {
                source_name: "g".to_string(),
                timeout_ms: 1,
            }
            .is_retryable()
        );
        assert!(
            Error::MalformedResponse {
                source_name: "g".to_string(),
                cause: "no choices".to_string(),
            }
            .is_retryable()
        );
        assert!(
            Error::DuplicateRejected {
                signature: "00ff".to_string(),
            }
            .is_retryable()
        );
        assert!(
            !Error::SourceUnavailable {
                source_name: "catalog".to_string(),
                cause: "empty".to_string(),
            }
            .is_retryable()
        );
        assert!(!Error::InvalidInput("x".to_string()).is_retryable());
    }
}
