//! Log filter and format resolution.

use crate::config::{LogFormat, LoggingSettings};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Filter used when neither the config nor the environment sets one.
pub const DEFAULT_FILTER: &str = "quizpool=info";

/// Filter used for `--verbose`.
pub const VERBOSE_FILTER: &str = "quizpool=debug";

/// Resolved logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Optional log file; stderr otherwise.
    pub file: Option<PathBuf>,
    /// Event filter.
    pub filter: EnvFilter,
    /// Directive that failed to parse, reported once logging is up.
    pub rejected_filter: Option<String>,
}

impl LoggingConfig {
    /// Resolves logging from config settings and the environment.
    ///
    /// Filter precedence: `QUIZPOOL_LOG`, `RUST_LOG`, `--verbose`, the
    /// config file, then [`DEFAULT_FILTER`]. `QUIZPOOL_LOG_FORMAT` and
    /// `QUIZPOOL_LOG_FILE` override the format and file.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        let directive = resolve_filter(
            std::env::var("QUIZPOOL_LOG").ok(),
            std::env::var("RUST_LOG").ok(),
            verbose,
            settings.filter.as_deref(),
        );
        let (filter, rejected_filter) = match EnvFilter::try_new(&directive) {
            Ok(filter) => (filter, None),
            Err(e) => (
                EnvFilter::new(DEFAULT_FILTER),
                Some(format!("{directive}: {e}")),
            ),
        };

        let format = std::env::var("QUIZPOOL_LOG_FORMAT")
            .ok()
            .map_or(settings.format, |v| {
                if v.trim().eq_ignore_ascii_case("json") {
                    LogFormat::Json
                } else {
                    LogFormat::Pretty
                }
            });
        let file = std::env::var_os("QUIZPOOL_LOG_FILE")
            .map(PathBuf::from)
            .or_else(|| settings.file.clone());

        Self {
            format,
            file,
            filter,
            rejected_filter,
        }
    }
}

/// Picks the first non-empty filter directive.
fn resolve_filter(
    quizpool_log: Option<String>,
    rust_log: Option<String>,
    verbose: bool,
    configured: Option<&str>,
) -> String {
    let from_env = quizpool_log
        .into_iter()
        .chain(rust_log)
        .find(|v| !v.trim().is_empty());
    if let Some(directive) = from_env {
        return directive;
    }
    if verbose {
        return VERBOSE_FILTER.to_string();
    }
    configured
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(DEFAULT_FILTER)
        .to_string()
}
