//! Difficulty levels, performance samples and controller state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered difficulty tag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    /// Warm-up material.
    Entry,
    /// Fundamentals.
    Basic,
    /// Default starting level.
    #[default]
    Intermediate,
    /// Demanding material.
    Advanced,
    /// Hardest tier.
    Challenge,
}

impl DifficultyLevel {
    /// Returns all levels in ascending order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Entry,
            Self::Basic,
            Self::Intermediate,
            Self::Advanced,
            Self::Challenge,
        ]
    }

    /// Position in the ordering, starting at 0.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Entry => 0,
            Self::Basic => 1,
            Self::Intermediate => 2,
            Self::Advanced => 3,
            Self::Challenge => 4,
        }
    }

    /// Next level up, saturating at `Challenge`.
    #[must_use]
    pub const fn step_up(self) -> Self {
        match self {
            Self::Entry => Self::Basic,
            Self::Basic => Self::Intermediate,
            Self::Intermediate => Self::Advanced,
            Self::Advanced | Self::Challenge => Self::Challenge,
        }
    }

    /// Next level down, saturating at `Entry`.
    #[must_use]
    pub const fn step_down(self) -> Self {
        match self {
            Self::Entry | Self::Basic => Self::Entry,
            Self::Intermediate => Self::Basic,
            Self::Advanced => Self::Intermediate,
            Self::Challenge => Self::Advanced,
        }
    }

    /// Returns the level as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Basic => "basic",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Challenge => "challenge",
        }
    }

    /// Parses a level from a string (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "entry" | "beginner" => Some(Self::Entry),
            "basic" | "easy" => Some(Self::Basic),
            "intermediate" | "medium" => Some(Self::Intermediate),
            "advanced" | "hard" => Some(Self::Advanced),
            "challenge" | "expert" => Some(Self::Challenge),
            _ => None,
        }
    }
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One answered item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceSample {
    /// Whether the answer was correct.
    pub correct: bool,
    /// Time the user took, in milliseconds.
    pub response_time_ms: i64,
    /// Time the item was expected to take, in milliseconds.
    pub expected_time_ms: i64,
    /// When the answer was submitted.
    pub timestamp: DateTime<Utc>,
}

impl PerformanceSample {
    /// Creates a sample stamped with the current time.
    #[must_use]
    pub fn new(correct: bool, response_time_ms: i64, expected_time_ms: i64) -> Self {
        Self {
            correct,
            response_time_ms,
            expected_time_ms,
            timestamp: Utc::now(),
        }
    }

    /// Response time divided by expected time.
    ///
    /// Negative response times count as instant answers. A non-positive
    /// expected time falls back to 30 seconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn time_ratio(&self) -> f64 {
        const FALLBACK_EXPECTED_MS: i64 = 30_000;
        let expected = if self.expected_time_ms > 0 {
            self.expected_time_ms
        } else {
            FALLBACK_EXPECTED_MS
        };
        self.response_time_ms.max(0) as f64 / expected as f64
    }
}

/// Component scores from one evaluation of the rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceScore {
    /// Fraction of correct answers.
    pub accuracy: f64,
    /// Mean stepwise speed score.
    pub speed: f64,
    /// Stability of per-sample scores.
    pub consistency: f64,
    /// Mean correctness/speed heuristic.
    pub confidence: f64,
    /// Weighted combination of the above.
    pub overall: f64,
    /// Number of samples the score was computed from.
    pub samples: usize,
}

/// Current difficulty of one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyState {
    /// Current level.
    pub level: DifficultyLevel,
    /// When the level last changed.
    pub last_adjusted_at: Option<DateTime<Utc>>,
    /// Human-readable reason for the latest decision.
    pub justification: String,
    /// Scores behind the latest decision.
    pub score: PerformanceScore,
}

impl DifficultyState {
    /// Initial state at the given level.
    #[must_use]
    pub fn initial(level: DifficultyLevel) -> Self {
        Self {
            level,
            last_adjusted_at: None,
            justification: format!("starting at {level}"),
            score: PerformanceScore::default(),
        }
    }
}
