//! Configuration management.
//!
//! Values come from, in increasing priority: built-in defaults, a TOML
//! file, then `QUIZPOOL_*` environment variables.

mod pool;

pub use pool::{CategorySpec, GenerationSettings, PoolSettings, StoreSettings};

use crate::services::deduplication::DeduplicationConfig;
use crate::services::difficulty::DifficultyConfig;
use crate::{DifficultyLevel, Error, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Main configuration for quizpool.
#[derive(Debug, Clone, Default)]
pub struct QuizPoolConfig {
    /// Pool sizing and refill timing.
    pub pool: PoolSettings,
    /// Generative source budget.
    pub generation: GenerationSettings,
    /// Near-duplicate detection.
    pub dedup: DeduplicationConfig,
    /// Difficulty controller tuning.
    pub difficulty: DifficultyConfig,
    /// Fingerprint store.
    pub store: StoreSettings,
    /// Local catalog file.
    pub catalog_path: Option<PathBuf>,
    /// Categories to pool.
    pub categories: Vec<CategorySpec>,
    /// LLM backend.
    pub llm: LlmConfig,
    /// Logging settings.
    pub logging: LoggingSettings,
    /// Metrics settings.
    pub metrics: MetricsSettings,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    /// Backend to use; `None` disables generation.
    pub provider: Option<LlmProvider>,
    /// Model name.
    pub model: Option<String>,
    /// API key.
    pub api_key: Option<SecretString>,
    /// Base URL for the provider (for self-hosted).
    pub base_url: Option<String>,
    /// HTTP request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// HTTP connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
    /// Consecutive failures before the circuit opens.
    pub breaker_failure_threshold: Option<u32>,
    /// How long the circuit stays open, in milliseconds.
    pub breaker_reset_ms: Option<u64>,
}

/// Available LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// Anthropic Claude.
    Anthropic,
    /// `OpenAI` or any compatible chat-completions endpoint.
    OpenAi,
    /// Ollama (local).
    Ollama,
}

impl LlmProvider {
    /// Parses a provider string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "anthropic" | "claude" => Some(Self::Anthropic),
            "openai" | "lmstudio" | "lm-studio" => Some(Self::OpenAi),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging section.
#[derive(Debug, Clone, Default)]
pub struct LoggingSettings {
    /// Output format.
    pub format: LogFormat,
    /// Append logs to this file instead of stderr.
    pub file: Option<PathBuf>,
    /// `EnvFilter` directive, e.g. `quizpool=debug`.
    pub filter: Option<String>,
}

/// Metrics section.
#[derive(Debug, Clone)]
pub struct MetricsSettings {
    /// Whether to install the Prometheus recorder.
    pub enabled: bool,
    /// Listener port for the scrape endpoint.
    pub port: u16,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Local catalog path.
    pub catalog_path: Option<String>,
    /// Categories.
    #[serde(default)]
    pub categories: Vec<CategorySpec>,
    /// Pool section.
    pub pool: Option<ConfigFilePool>,
    /// Generation section.
    pub generation: Option<ConfigFileGeneration>,
    /// Dedup section.
    pub dedup: Option<ConfigFileDedup>,
    /// Difficulty section.
    pub difficulty: Option<ConfigFileDifficulty>,
    /// Store section.
    pub store: Option<ConfigFileStore>,
    /// LLM section.
    pub llm: Option<ConfigFileLlm>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
    /// Metrics section.
    pub metrics: Option<ConfigFileMetrics>,
}

/// Pool section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFilePool {
    /// Capacity.
    pub capacity: Option<usize>,
    /// Low-water mark.
    pub low_water_mark: Option<usize>,
    /// Refill target.
    pub target: Option<usize>,
    /// Critical refill interval.
    pub refill_critical_ms: Option<u64>,
    /// Low refill interval.
    pub refill_low_ms: Option<u64>,
    /// Idle refill interval.
    pub refill_idle_ms: Option<u64>,
    /// Avoid list length.
    pub avoid_list_len: Option<usize>,
}

/// Generation section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileGeneration {
    /// Per-call timeout.
    pub timeout_ms: Option<u64>,
    /// Attempts per candidate.
    pub max_attempts: Option<u32>,
    /// Fallback effort.
    pub default_effort_seconds: Option<u32>,
}

/// Dedup section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileDedup {
    /// Enable/disable.
    pub enabled: Option<bool>,
    /// Hamming threshold.
    pub threshold: Option<u32>,
    /// Token cap.
    pub max_tokens: Option<usize>,
    /// Unigram weight.
    pub word_weight: Option<i64>,
    /// Bigram weight.
    pub bigram_weight: Option<i64>,
    /// Trigram weight.
    pub trigram_weight: Option<i64>,
}

/// Difficulty section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileDifficulty {
    /// Rolling window size.
    pub window_size: Option<usize>,
    /// Starting level.
    pub initial_level: Option<String>,
    /// Samples required between adjustments.
    pub min_samples_between_adjustments: Option<usize>,
}

/// Store section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileStore {
    /// Store path.
    pub path: Option<String>,
    /// Signature cap.
    pub capacity: Option<usize>,
}

/// LLM section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLlm {
    /// Provider name.
    pub provider: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Base URL.
    pub base_url: Option<String>,
    /// Request timeout.
    pub timeout_ms: Option<u64>,
    /// Connect timeout.
    pub connect_timeout_ms: Option<u64>,
    /// Breaker threshold.
    pub breaker_failure_threshold: Option<u32>,
    /// Breaker reset.
    pub breaker_reset_ms: Option<u64>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Log file.
    pub file: Option<String>,
    /// Filter directive.
    pub filter: Option<String>,
}

/// Metrics section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileMetrics {
    /// Enable the recorder.
    pub enabled: Option<bool>,
    /// Listener port.
    pub port: Option<u16>,
}

impl QuizPoolConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for [`ConfigFile`].
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;
        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from a file path.
    ///
    /// Relative `catalog_path` and `store.path` entries are resolved against
    /// the file's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        let mut config = Self::from_toml_str(&contents)?;

        if let Some(base) = path.parent() {
            config.catalog_path = config.catalog_path.map(|p| resolve(base, p));
            config.store.path = config.store.path.map(|p| resolve(base, p));
        }
        Ok(config)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks `<config_dir>/quizpool/config.toml`, then
    /// `~/.config/quizpool/config.toml`. Returns defaults if neither exists
    /// or parses.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let candidates = [
            base_dirs.config_dir().join("quizpool").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("quizpool")
                .join("config.toml"),
        ];

        for candidate in candidates {
            if !candidate.exists() {
                continue;
            }
            match Self::load_from_file(&candidate) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %candidate.display(), error = %e, "Ignoring unreadable config file");
                },
            }
        }

        Self::default()
    }

    /// Applies `QUIZPOOL_*` environment overrides to every section.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        self.pool = self.pool.with_env_overrides();
        self.generation = self.generation.with_env_overrides();
        self.dedup = self.dedup.with_env_overrides();
        self.difficulty = self.difficulty.with_env_overrides();
        self.store = self.store.with_env_overrides();

        if let Some(path) = env_path("QUIZPOOL_CATALOG_PATH") {
            self.catalog_path = Some(path);
        }
        if let Ok(v) = std::env::var("QUIZPOOL_LLM_PROVIDER") {
            self.llm.provider = LlmProvider::parse(&v);
        }
        if let Ok(v) = std::env::var("QUIZPOOL_LLM_MODEL") {
            self.llm.model = Some(v);
        }
        if let Ok(v) = std::env::var("QUIZPOOL_LLM_API_KEY") {
            self.llm.api_key = Some(SecretString::from(v));
        }
        if let Ok(v) = std::env::var("QUIZPOOL_LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("QUIZPOOL_LOG_FORMAT") {
            self.logging.format = parse_log_format(&v);
        }
        if let Some(path) = env_path("QUIZPOOL_LOG_FILE") {
            self.logging.file = Some(path);
        }
        if let Some(enabled) = env_bool("QUIZPOOL_METRICS_ENABLED") {
            self.metrics.enabled = enabled;
        }
        if let Some(port) = env_parse("QUIZPOOL_METRICS_PORT") {
            self.metrics.port = port;
        }
        self
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for a zero capacity, a low-water mark
    /// above capacity, or duplicate category names.
    pub fn validate(&self) -> Result<()> {
        if self.pool.capacity == 0 {
            return Err(Error::InvalidInput("pool capacity must be > 0".to_string()));
        }
        if self.pool.low_water_mark > self.pool.capacity {
            return Err(Error::InvalidInput(format!(
                "low-water mark {} exceeds capacity {}",
                self.pool.low_water_mark, self.pool.capacity
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for category in &self.categories {
            if category.name.trim().is_empty() {
                return Err(Error::InvalidInput("category name is empty".to_string()));
            }
            if !seen.insert(category.name.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "category '{}' listed twice",
                    category.name
                )));
            }
        }
        Ok(())
    }

    /// Converts a `ConfigFile` to `QuizPoolConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self {
            catalog_path: file.catalog_path.map(PathBuf::from),
            categories: file.categories,
            ..Self::default()
        };

        if let Some(pool) = file.pool {
            apply_pool(&mut config.pool, pool);
        }
        if let Some(generation) = file.generation {
            if let Some(ms) = generation.timeout_ms {
                config.generation.timeout = Duration::from_millis(ms);
            }
            if let Some(v) = generation.max_attempts {
                config.generation.max_attempts = v.max(1);
            }
            if let Some(v) = generation.default_effort_seconds {
                config.generation.default_effort_seconds = v;
            }
        }
        if let Some(dedup) = file.dedup {
            apply_dedup(&mut config.dedup, dedup);
        }
        if let Some(difficulty) = file.difficulty {
            if let Some(v) = difficulty.window_size {
                config.difficulty.window_size = v.max(1);
            }
            if let Some(level) = difficulty.initial_level.as_deref().and_then(DifficultyLevel::parse) {
                config.difficulty.initial_level = level;
            }
            if let Some(v) = difficulty.min_samples_between_adjustments {
                config.difficulty.min_samples_between_adjustments = v;
            }
        }
        if let Some(store) = file.store {
            config.store.path = store.path.map(PathBuf::from);
            if let Some(v) = store.capacity {
                config.store.capacity = v.max(1);
            }
        }
        if let Some(llm) = file.llm {
            config.llm = LlmConfig {
                provider: llm.provider.as_deref().and_then(LlmProvider::parse),
                model: llm.model,
                api_key: llm.api_key.map(SecretString::from),
                base_url: llm.base_url,
                timeout_ms: llm.timeout_ms,
                connect_timeout_ms: llm.connect_timeout_ms,
                breaker_failure_threshold: llm.breaker_failure_threshold,
                breaker_reset_ms: llm.breaker_reset_ms,
            };
        }
        if let Some(logging) = file.logging {
            if let Some(format) = logging.format {
                config.logging.format = parse_log_format(&format);
            }
            config.logging.file = logging.file.map(PathBuf::from);
            config.logging.filter = logging.filter;
        }
        if let Some(metrics) = file.metrics {
            if let Some(enabled) = metrics.enabled {
                config.metrics.enabled = enabled;
            }
            if let Some(port) = metrics.port {
                config.metrics.port = port;
            }
        }

        config
    }
}

fn apply_pool(settings: &mut PoolSettings, pool: ConfigFilePool) {
    if let Some(v) = pool.capacity {
        settings.capacity = v;
    }
    if let Some(v) = pool.low_water_mark {
        settings.low_water_mark = v;
    }
    settings.target = pool.target.or(settings.target);
    if let Some(ms) = pool.refill_critical_ms {
        settings.refill_interval_critical = Duration::from_millis(ms);
    }
    if let Some(ms) = pool.refill_low_ms {
        settings.refill_interval_low = Duration::from_millis(ms);
    }
    if let Some(ms) = pool.refill_idle_ms {
        settings.refill_interval_idle = Duration::from_millis(ms);
    }
    if let Some(v) = pool.avoid_list_len {
        settings.avoid_list_len = v;
    }
}

fn apply_dedup(config: &mut DeduplicationConfig, dedup: ConfigFileDedup) {
    if let Some(v) = dedup.enabled {
        config.enabled = v;
    }
    if let Some(v) = dedup.threshold {
        config.threshold = v;
    }
    if let Some(v) = dedup.max_tokens {
        config.max_tokens = v.max(1);
    }
    if let Some(v) = dedup.word_weight {
        config.word_weight = v;
    }
    if let Some(v) = dedup.bigram_weight {
        config.bigram_weight = v;
    }
    if let Some(v) = dedup.trigram_weight {
        config.trigram_weight = v;
    }
}

fn resolve(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path
    }
}

fn parse_log_format(s: &str) -> LogFormat {
    if s.eq_ignore_ascii_case("json") {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    }
}

/// Reads and parses an environment variable, ignoring unparsable values.
pub(crate) fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Reads a boolean environment variable (`true`/`1`/`false`/`0`).
pub(crate) fn env_bool(key: &str) -> Option<bool> {
    let value = std::env::var(key).ok()?;
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Reads a non-empty path from an environment variable.
pub(crate) fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    const SAMPLE: &str = r#"
catalog_path = "catalog.toml"

[[categories]]
name = "history"
topics = ["rome", "egypt"]

[[categories]]
name = "science"

[pool]
capacity = 12
low_water_mark = 4
refill_critical_ms = 1000

[generation]
timeout_ms = 2500
max_attempts = 3

[dedup]
threshold = 3
max_tokens = 150

[difficulty]
initial_level = "basic"
window_size = 7

[store]
path = "data/fingerprints.json"
capacity = 500

[llm]
provider = "openai"
model = "gpt-4o-mini"
api_key = "sk-test"

[logging]
format = "json"
"#;

    #[test]
    fn test_parse_full_file() {
        let config = QuizPoolConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.categories.len(), 2);
        assert_eq!(config.categories[0].topics, vec!["rome", "egypt"]);
        assert_eq!(config.pool.capacity, 12);
        assert_eq!(config.pool.low_water_mark, 4);
        assert_eq!(config.pool.refill_interval_critical, Duration::from_secs(1));
        assert_eq!(config.pool.refill_interval_idle, Duration::from_secs(30));
        assert_eq!(config.generation.timeout, Duration::from_millis(2500));
        assert_eq!(config.generation.max_attempts, 3);
        assert_eq!(config.dedup.threshold, 3);
        assert_eq!(config.dedup.max_tokens, 150);
        assert_eq!(config.difficulty.initial_level, DifficultyLevel::Basic);
        assert_eq!(config.difficulty.window_size, 7);
        assert_eq!(config.store.capacity, 500);
        assert_eq!(config.llm.provider, Some(LlmProvider::OpenAi));
        assert_eq!(
            config.llm.api_key.as_ref().map(|k| k.expose_secret().to_string()),
            Some("sk-test".to_string())
        );
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = QuizPoolConfig::default();
        assert_eq!(config.pool.capacity, 10);
        assert_eq!(config.pool.low_water_mark, 3);
        assert_eq!(config.generation.timeout, Duration::from_secs(10));
        assert_eq!(config.generation.max_attempts, 5);
        assert_eq!(config.store.capacity, 300);
        assert!(config.llm.provider.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quizpool.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = QuizPoolConfig::load_from_file(&path).unwrap();
        assert_eq!(config.catalog_path, Some(dir.path().join("catalog.toml")));
        assert_eq!(
            config.store.path,
            Some(dir.path().join("data/fingerprints.json"))
        );
    }

    #[test]
    fn test_validate_rejects_bad_bounds() {
        let mut config = QuizPoolConfig::default();
        config.pool.low_water_mark = 11;
        assert!(config.validate().is_err());

        config.pool = PoolSettings::default().with_bounds(0, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_categories() {
        let config = QuizPoolConfig {
            categories: vec![CategorySpec::new("math"), CategorySpec::new("math")],
            ..QuizPoolConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_demo_config_is_valid() {
        let config =
            QuizPoolConfig::from_toml_str(include_str!("../../demos/quizpool.toml")).unwrap();
        assert_eq!(config.categories.len(), 2);
        assert_eq!(config.pool.capacity, 6);
        assert!(config.llm.provider.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(QuizPoolConfig::from_toml_str("[pool\ncapacity = ").is_err());
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(LlmProvider::parse("Claude"), Some(LlmProvider::Anthropic));
        assert_eq!(LlmProvider::parse("lmstudio"), Some(LlmProvider::OpenAi));
        assert_eq!(LlmProvider::parse("OLLAMA"), Some(LlmProvider::Ollama));
        assert_eq!(LlmProvider::parse("none"), None);
    }
}
