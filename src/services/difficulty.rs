//! Feedback-driven difficulty controller.
//!
//! Each category keeps a rolling window of answered items. After every
//! submission the window is scored and the level moves at most one step:
//!
//! | Component | Weight | Per-sample input |
//! |-----------|--------|------------------|
//! | accuracy | 0.4 | correct or not |
//! | speed | 0.3 | stepwise on `response / expected` |
//! | consistency | 0.2 | stddev of `60·correct + 40·speed` |
//! | confidence | 0.1 | correctness crossed with speed |
//!
//! Adjustments are gated on a minimum number of samples since the last
//! change, so a single streak moves the level once, not on every answer.

use crate::config::env_parse;
use crate::models::{DifficultyLevel, DifficultyState, PerformanceSample, PerformanceScore};
use chrono::Utc;
use std::collections::VecDeque;

const ACCURACY_WEIGHT: f64 = 0.4;
const SPEED_WEIGHT: f64 = 0.3;
const CONSISTENCY_WEIGHT: f64 = 0.2;
const CONFIDENCE_WEIGHT: f64 = 0.1;

/// Consistency assumed until three samples exist.
const DEFAULT_CONSISTENCY: f64 = 0.7;

/// Difficulty controller settings.
///
/// # Environment Variables
///
/// | Variable | Type | Default |
/// |----------|------|---------|
/// | `QUIZPOOL_DIFFICULTY_WINDOW` | usize | `5` |
/// | `QUIZPOOL_DIFFICULTY_INITIAL_LEVEL` | level name | `intermediate` |
/// | `QUIZPOOL_DIFFICULTY_MIN_SAMPLES` | usize | `3` |
#[derive(Debug, Clone, PartialEq)]
pub struct DifficultyConfig {
    /// Rolling window size.
    pub window_size: usize,
    /// Level each category starts at.
    pub initial_level: DifficultyLevel,
    /// Samples required since the last change before another change.
    pub min_samples_between_adjustments: usize,
    /// Overall score at or above which the level rises.
    pub raise_overall: f64,
    /// Accuracy also required to rise.
    pub raise_accuracy: f64,
    /// Overall score at or below which the level drops.
    pub lower_overall: f64,
    /// Accuracy at or below which the level drops.
    pub lower_accuracy: f64,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            window_size: 5,
            initial_level: DifficultyLevel::Intermediate,
            min_samples_between_adjustments: 3,
            raise_overall: 0.85,
            raise_accuracy: 0.8,
            lower_overall: 0.4,
            lower_accuracy: 0.4,
        }
    }
}

impl DifficultyConfig {
    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse::<usize>("QUIZPOOL_DIFFICULTY_WINDOW") {
            self.window_size = v.max(1);
        }
        if let Some(level) = std::env::var("QUIZPOOL_DIFFICULTY_INITIAL_LEVEL")
            .ok()
            .as_deref()
            .and_then(DifficultyLevel::parse)
        {
            self.initial_level = level;
        }
        if let Some(v) = env_parse("QUIZPOOL_DIFFICULTY_MIN_SAMPLES") {
            self.min_samples_between_adjustments = v;
        }
        self
    }

    /// Builder method to set the starting level.
    #[must_use]
    pub const fn with_initial_level(mut self, level: DifficultyLevel) -> Self {
        self.initial_level = level;
        self
    }

    /// Builder method to set the adjustment gate.
    #[must_use]
    pub const fn with_min_samples(mut self, samples: usize) -> Self {
        self.min_samples_between_adjustments = samples;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Raise,
    Lower,
    Hold,
}

/// Per-category difficulty controller.
///
/// # Example
///
/// ```rust
/// use quizpool::{DifficultyController, DifficultyLevel, PerformanceSample};
/// use quizpool::services::difficulty::DifficultyConfig;
///
/// let mut controller = DifficultyController::new(DifficultyConfig::default());
/// for _ in 0..5 {
///     controller.submit_result(PerformanceSample::new(true, 1_000, 10_000));
/// }
/// assert_eq!(controller.current_level(), DifficultyLevel::Advanced);
/// ```
#[derive(Debug, Clone)]
pub struct DifficultyController {
    config: DifficultyConfig,
    window: VecDeque<PerformanceSample>,
    samples_since_adjustment: usize,
    state: DifficultyState,
}

impl DifficultyController {
    /// Creates a controller at the configured initial level.
    #[must_use]
    pub fn new(config: DifficultyConfig) -> Self {
        let state = DifficultyState::initial(config.initial_level);
        Self {
            window: VecDeque::with_capacity(config.window_size.max(1)),
            config,
            samples_since_adjustment: 0,
            state,
        }
    }

    /// Current level.
    #[must_use]
    pub const fn current_level(&self) -> DifficultyLevel {
        self.state.level
    }

    /// Latest state.
    #[must_use]
    pub const fn state(&self) -> &DifficultyState {
        &self.state
    }

    /// Number of samples in the window.
    #[must_use]
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Adds a sample, re-scores the window and applies at most one step.
    pub fn submit_result(&mut self, sample: PerformanceSample) -> DifficultyState {
        if self.window.len() >= self.config.window_size.max(1) {
            self.window.pop_front();
        }
        self.window.push_back(sample);
        self.samples_since_adjustment += 1;

        let score = score_window(self.window.iter());
        let previous = self.state.level;

        if self.samples_since_adjustment < self.config.min_samples_between_adjustments {
            self.state.score = score;
            self.state.justification = format!(
                "{}: gathering evidence ({}/{} samples), holding at {previous}",
                describe(&score),
                self.samples_since_adjustment,
                self.config.min_samples_between_adjustments
            );
            return self.state.clone();
        }

        let (level, action) = match self.decide(&score) {
            Decision::Raise if previous < DifficultyLevel::Challenge => {
                let next = previous.step_up();
                (next, format!("raising difficulty to {next}"))
            },
            Decision::Lower if previous > DifficultyLevel::Entry => {
                let next = previous.step_down();
                (next, format!("lowering difficulty to {next}"))
            },
            Decision::Raise | Decision::Lower => {
                (previous, format!("already at {previous}, holding"))
            },
            Decision::Hold => (previous, format!("holding at {previous}")),
        };

        self.state.score = score;
        self.state.justification = format!("{}: {action}", describe(&score));

        if level != previous {
            self.state.level = level;
            self.state.last_adjusted_at = Some(Utc::now());
            self.samples_since_adjustment = 0;

            let direction = if level > previous { "up" } else { "down" };
            tracing::info!(
                from = %previous,
                to = %level,
                overall = score.overall,
                accuracy = score.accuracy,
                "Difficulty adjusted"
            );
            metrics::counter!("difficulty_adjustments_total", "direction" => direction)
                .increment(1);
        } else {
            tracing::debug!(level = %level, overall = score.overall, "Difficulty held");
        }

        self.state.clone()
    }

    fn decide(&self, score: &PerformanceScore) -> Decision {
        if score.overall >= self.config.raise_overall && score.accuracy >= self.config.raise_accuracy
        {
            Decision::Raise
        } else if score.overall <= self.config.lower_overall
            || score.accuracy <= self.config.lower_accuracy
        {
            Decision::Lower
        } else {
            Decision::Hold
        }
    }
}

/// Stepwise speed score for a `response / expected` ratio.
#[must_use]
pub fn speed_score(ratio: f64) -> f64 {
    if ratio <= 0.7 {
        1.0
    } else if ratio <= 1.0 {
        0.8
    } else if ratio <= 1.5 {
        0.6
    } else if ratio <= 2.0 {
        0.4
    } else {
        0.2
    }
}

/// Confidence heuristic for one answer.
#[must_use]
pub fn confidence_score(correct: bool, ratio: f64) -> f64 {
    match (correct, ratio) {
        (true, r) if r <= 0.7 => 1.0,
        (true, r) if r <= 1.0 => 0.8,
        (true, _) => 0.6,
        (false, r) if r <= 1.0 => 0.3,
        (false, _) => 0.1,
    }
}

/// Scores a window of samples.
///
/// An empty window scores zero everywhere.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score_window<'a>(samples: impl IntoIterator<Item = &'a PerformanceSample>) -> PerformanceScore {
    let samples: Vec<&PerformanceSample> = samples.into_iter().collect();
    if samples.is_empty() {
        return PerformanceScore::default();
    }
    let n = samples.len() as f64;

    let mut correct = 0.0;
    let mut speed_total = 0.0;
    let mut confidence_total = 0.0;
    let mut sample_scores = Vec::with_capacity(samples.len());

    for sample in &samples {
        let ratio = sample.time_ratio();
        let speed = speed_score(ratio);
        let hit = if sample.correct { 1.0 } else { 0.0 };
        correct += hit;
        speed_total += speed;
        confidence_total += confidence_score(sample.correct, ratio);
        sample_scores.push(60.0f64.mul_add(hit, 40.0 * speed));
    }

    let accuracy = correct / n;
    let speed = speed_total / n;
    let confidence = confidence_total / n;
    let consistency = if samples.len() < 3 {
        DEFAULT_CONSISTENCY
    } else {
        let mean = sample_scores.iter().sum::<f64>() / n;
        let variance = sample_scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        (1.0 - variance.sqrt() / 100.0).max(0.0)
    };

    let overall = ACCURACY_WEIGHT * accuracy
        + SPEED_WEIGHT * speed
        + CONSISTENCY_WEIGHT * consistency
        + CONFIDENCE_WEIGHT * confidence;

    PerformanceScore {
        accuracy,
        speed,
        consistency,
        confidence,
        overall,
        samples: samples.len(),
    }
}

fn describe(score: &PerformanceScore) -> String {
    let steadiness = if score.consistency >= 0.8 {
        "consistent"
    } else if score.consistency >= 0.5 {
        "somewhat consistent"
    } else {
        "inconsistent"
    };
    format!(
        "accuracy {:.0}%, speed {:.2}, {steadiness}, overall {:.2}",
        score.accuracy * 100.0,
        score.speed,
        score.overall
    )
}
