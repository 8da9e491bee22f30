//! Deduplication configuration.
//!
//! The threshold and n-gram weights are tuning knobs, not contracts.

use crate::config::{env_bool, env_parse};

/// Configuration for the deduplication service.
///
/// # Environment Variables
///
/// | Variable | Type | Default | Description |
/// |----------|------|---------|-------------|
/// | `QUIZPOOL_DEDUP_ENABLED` | bool | `true` | Enable deduplication |
/// | `QUIZPOOL_DEDUP_THRESHOLD` | u32 | `2` | Max Hamming distance counted as duplicate |
/// | `QUIZPOOL_DEDUP_MAX_TOKENS` | usize | `200` | Token cap per fingerprint |
/// | `QUIZPOOL_DEDUP_WORD_WEIGHT` | i64 | `1` | Unigram weight |
/// | `QUIZPOOL_DEDUP_BIGRAM_WEIGHT` | i64 | `1` | Bigram weight |
/// | `QUIZPOOL_DEDUP_TRIGRAM_WEIGHT` | i64 | `1` | Trigram weight |
///
/// # Example
///
/// ```rust
/// use quizpool::services::deduplication::DeduplicationConfig;
///
/// let config = DeduplicationConfig::default();
/// assert!(config.enabled);
/// assert_eq!(config.threshold, 2);
/// assert_eq!(config.max_tokens, 200);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeduplicationConfig {
    /// Enable/disable entire deduplication.
    pub enabled: bool,

    /// Signatures at most this many bits apart are duplicates.
    pub threshold: u32,

    /// Token list cap.
    pub max_tokens: usize,

    /// Accumulator weight for single words.
    pub word_weight: i64,

    /// Accumulator weight for word bigrams.
    pub bigram_weight: i64,

    /// Accumulator weight for word trigrams.
    pub trigram_weight: i64,
}

impl DeduplicationConfig {
    /// Creates a new configuration from environment variables.
    ///
    /// Falls back to defaults for any unset variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_bool("QUIZPOOL_DEDUP_ENABLED") {
            self.enabled = v;
        }
        if let Some(v) = env_parse("QUIZPOOL_DEDUP_THRESHOLD") {
            self.threshold = v;
        }
        if let Some(v) = env_parse::<usize>("QUIZPOOL_DEDUP_MAX_TOKENS") {
            self.max_tokens = v.max(1);
        }
        if let Some(v) = env_parse("QUIZPOOL_DEDUP_WORD_WEIGHT") {
            self.word_weight = v;
        }
        if let Some(v) = env_parse("QUIZPOOL_DEDUP_BIGRAM_WEIGHT") {
            self.bigram_weight = v;
        }
        if let Some(v) = env_parse("QUIZPOOL_DEDUP_TRIGRAM_WEIGHT") {
            self.trigram_weight = v;
        }
        self
    }

    /// Builder method to set enabled state.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder method to set the Hamming threshold.
    #[must_use]
    pub const fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Builder method to set the token cap.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Builder method to set the n-gram weights.
    #[must_use]
    pub const fn with_weights(mut self, word: i64, bigram: i64, trigram: i64) -> Self {
        self.word_weight = word;
        self.bigram_weight = bigram;
        self.trigram_weight = trigram;
        self
    }
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 2,
            max_tokens: 200,
            word_weight: 1,
            bigram_weight: 1,
            trigram_weight: 1,
        }
    }
}
