//! Pool, generation and store settings.

use super::{env_parse, env_path};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// A category to keep a pool for.
///
/// Topics are rotated across replenishment attempts. A category without
/// topics uses its own name as the only topic.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategorySpec {
    /// Category name (pool key).
    pub name: String,
    /// Topics to rotate through.
    #[serde(default)]
    pub topics: Vec<String>,
}

impl CategorySpec {
    /// Creates a category without explicit topics.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            topics: Vec::new(),
        }
    }

    /// Sets the topics.
    #[must_use]
    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }

    /// Topic at rotation position `cursor`.
    #[must_use]
    pub fn topic_at(&self, cursor: usize) -> &str {
        if self.topics.is_empty() {
            &self.name
        } else {
            &self.topics[cursor % self.topics.len()]
        }
    }
}

/// Pool sizing and refill timing.
///
/// # Environment Variables
///
/// | Variable | Type | Default |
/// |----------|------|---------|
/// | `QUIZPOOL_POOL_CAPACITY` | usize | `10` |
/// | `QUIZPOOL_POOL_LOW_WATER_MARK` | usize | `3` |
/// | `QUIZPOOL_POOL_TARGET` | usize | capacity |
/// | `QUIZPOOL_REFILL_CRITICAL_MS` | u64 | `5000` |
/// | `QUIZPOOL_REFILL_LOW_MS` | u64 | `15000` |
/// | `QUIZPOOL_REFILL_IDLE_MS` | u64 | `30000` |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// Maximum items per pool.
    pub capacity: usize,
    /// Occupancy below which a dequeue wakes the replenisher.
    pub low_water_mark: usize,
    /// Occupancy a cycle refills to; `None` means capacity.
    pub target: Option<usize>,
    /// Timer interval when occupancy is at or below half the low-water mark.
    pub refill_interval_critical: Duration,
    /// Timer interval when occupancy is below the low-water mark.
    pub refill_interval_low: Duration,
    /// Timer interval otherwise.
    pub refill_interval_idle: Duration,
    /// How many recent item summaries are sent as the avoid list.
    pub avoid_list_len: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            capacity: 10,
            low_water_mark: 3,
            target: None,
            refill_interval_critical: Duration::from_secs(5),
            refill_interval_low: Duration::from_secs(15),
            refill_interval_idle: Duration::from_secs(30),
            avoid_list_len: 20,
        }
    }
}

impl PoolSettings {
    /// Effective refill target, never above capacity.
    #[must_use]
    pub fn effective_target(&self) -> usize {
        self.target.unwrap_or(self.capacity).min(self.capacity)
    }

    /// Timer interval for the given occupancy.
    #[must_use]
    pub const fn interval_for(&self, occupancy: usize) -> Duration {
        if occupancy <= self.low_water_mark / 2 {
            self.refill_interval_critical
        } else if occupancy < self.low_water_mark {
            self.refill_interval_low
        } else {
            self.refill_interval_idle
        }
    }

    /// Sets capacity and low-water mark.
    #[must_use]
    pub const fn with_bounds(mut self, capacity: usize, low_water_mark: usize) -> Self {
        self.capacity = capacity;
        self.low_water_mark = low_water_mark;
        self
    }

    /// Sets all three refill intervals.
    #[must_use]
    pub const fn with_intervals(mut self, critical: Duration, low: Duration, idle: Duration) -> Self {
        self.refill_interval_critical = critical;
        self.refill_interval_low = low;
        self.refill_interval_idle = idle;
        self
    }

    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse("QUIZPOOL_POOL_CAPACITY") {
            self.capacity = v;
        }
        if let Some(v) = env_parse("QUIZPOOL_POOL_LOW_WATER_MARK") {
            self.low_water_mark = v;
        }
        if let Some(v) = env_parse("QUIZPOOL_POOL_TARGET") {
            self.target = Some(v);
        }
        if let Some(ms) = env_parse("QUIZPOOL_REFILL_CRITICAL_MS") {
            self.refill_interval_critical = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse("QUIZPOOL_REFILL_LOW_MS") {
            self.refill_interval_low = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse("QUIZPOOL_REFILL_IDLE_MS") {
            self.refill_interval_idle = Duration::from_millis(ms);
        }
        self
    }
}

/// Generative source budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSettings {
    /// Per-call time budget.
    pub timeout: Duration,
    /// Attempts per candidate before falling through to the next source.
    pub max_attempts: u32,
    /// Effort assumed when the backend omits one.
    pub default_effort_seconds: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_attempts: 5,
            default_effort_seconds: 60,
        }
    }
}

impl GenerationSettings {
    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(ms) = env_parse("QUIZPOOL_GENERATION_TIMEOUT_MS") {
            self.timeout = Duration::from_millis(ms);
        }
        if let Some(v) = env_parse::<u32>("QUIZPOOL_GENERATION_MAX_ATTEMPTS") {
            self.max_attempts = v.max(1);
        }
        self
    }
}

/// Persisted fingerprint store location and cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// Store file; `None` keeps fingerprints in memory only.
    pub path: Option<PathBuf>,
    /// Maximum number of persisted signatures.
    pub capacity: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: None,
            capacity: 300,
        }
    }
}

impl StoreSettings {
    /// Default store path under the platform data directory.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "quizpool")
            .map(|dirs| dirs.data_dir().join("fingerprints.json"))
    }

    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(path) = env_path("QUIZPOOL_STORE_PATH") {
            self.path = Some(path);
        }
        if let Some(v) = env_parse::<usize>("QUIZPOOL_STORE_CAPACITY") {
            self.capacity = v.max(1);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, Duration::from_secs(5); "empty pool is critical")]
    #[test_case(1, Duration::from_secs(5); "half the low-water mark is critical")]
    #[test_case(2, Duration::from_secs(15); "below low-water mark")]
    #[test_case(3, Duration::from_secs(30); "at low-water mark")]
    #[test_case(10, Duration::from_secs(30); "full pool")]
    fn test_interval_for(occupancy: usize, expected: Duration) {
        let settings = PoolSettings::default();
        assert_eq!(settings.interval_for(occupancy), expected);
    }

    #[test]
    fn test_effective_target_clamps_to_capacity() {
        let mut settings = PoolSettings::default();
        assert_eq!(settings.effective_target(), 10);
        settings.target = Some(50);
        assert_eq!(settings.effective_target(), 10);
        settings.target = Some(6);
        assert_eq!(settings.effective_target(), 6);
    }

    #[test]
    fn test_topic_rotation() {
        let bare = CategorySpec::new("geography");
        assert_eq!(bare.topic_at(7), "geography");

        let spec = CategorySpec::new("geography").with_topics(["rivers", "capitals"]);
        assert_eq!(spec.topic_at(0), "rivers");
        assert_eq!(spec.topic_at(1), "capitals");
        assert_eq!(spec.topic_at(2), "rivers");
    }
}
