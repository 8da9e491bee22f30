//! LLM resilience wrapper with circuit breaking and request metrics.
//!
//! A backend that keeps failing is taken out of rotation for a while so
//! the replenisher falls through to the catalog instead of burning its
//! attempt budget on calls that cannot succeed.

use super::LlmProvider;
use crate::config::{LlmConfig, env_parse};
use crate::{Error, Result};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Resilience configuration for LLM calls.
#[derive(Debug, Clone)]
pub struct LlmResilienceConfig {
    /// Consecutive failures before opening the circuit.
    pub breaker_failure_threshold: u32,
    /// How long to keep the circuit open before half-open.
    pub breaker_reset_timeout_ms: u64,
    /// Maximum trial calls while half-open.
    pub breaker_half_open_max_calls: u32,
}

impl Default for LlmResilienceConfig {
    fn default() -> Self {
        Self {
            breaker_failure_threshold: 3,
            breaker_reset_timeout_ms: 30_000,
            breaker_half_open_max_calls: 1,
        }
    }
}

impl LlmResilienceConfig {
    /// Loads resilience configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Loads resilience configuration from config file settings.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut settings = Self::default();
        if let Some(threshold) = config.breaker_failure_threshold {
            settings.breaker_failure_threshold = threshold.max(1);
        }
        if let Some(reset_ms) = config.breaker_reset_ms {
            settings.breaker_reset_timeout_ms = reset_ms;
        }
        settings
    }

    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse::<u32>("QUIZPOOL_LLM_BREAKER_FAILURE_THRESHOLD") {
            self.breaker_failure_threshold = v.max(1);
        }
        if let Some(v) = env_parse("QUIZPOOL_LLM_BREAKER_RESET_MS") {
            self.breaker_reset_timeout_ms = v;
        }
        if let Some(v) = env_parse::<u32>("QUIZPOOL_LLM_BREAKER_HALF_OPEN_MAX_CALLS") {
            self.breaker_half_open_max_calls = v.max(1);
        }
        self
    }
}

/// Observable circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls are rejected until the reset timeout elapses.
    Open,
    /// A limited number of trial calls are let through.
    HalfOpen,
}

impl CircuitState {
    const fn gauge_value(self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::Open => 1.0,
            Self::HalfOpen => 2.0,
        }
    }
}

/// Circuit breaker state machine.
#[derive(Debug)]
enum BreakerState {
    Closed { failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { attempts: u32 },
}

#[derive(Debug)]
struct CircuitBreaker {
    state: BreakerState,
    failure_threshold: u32,
    reset_timeout: Duration,
    half_open_max_calls: u32,
}

impl CircuitBreaker {
    fn new(config: &LlmResilienceConfig) -> Self {
        Self {
            state: BreakerState::Closed { failures: 0 },
            failure_threshold: config.breaker_failure_threshold.max(1),
            reset_timeout: Duration::from_millis(config.breaker_reset_timeout_ms),
            half_open_max_calls: config.breaker_half_open_max_calls.max(1),
        }
    }

    fn allow(&mut self) -> bool {
        match self.state {
            BreakerState::Closed { .. } => true,
            BreakerState::Open { opened_at } => {
                if opened_at.elapsed() >= self.reset_timeout {
                    self.state = BreakerState::HalfOpen { attempts: 1 };
                    true
                } else {
                    false
                }
            },
            BreakerState::HalfOpen { ref mut attempts } => {
                if *attempts >= self.half_open_max_calls {
                    false
                } else {
                    *attempts += 1;
                    true
                }
            },
        }
    }

    const fn on_success(&mut self) {
        self.state = BreakerState::Closed { failures: 0 };
    }

    fn on_failure(&mut self) -> bool {
        match self.state {
            BreakerState::Closed { ref mut failures } => {
                *failures += 1;
                if *failures >= self.failure_threshold {
                    self.state = BreakerState::Open {
                        opened_at: Instant::now(),
                    };
                    return true;
                }
            },
            BreakerState::HalfOpen { .. } => {
                self.state = BreakerState::Open {
                    opened_at: Instant::now(),
                };
                return true;
            },
            BreakerState::Open { .. } => {},
        }
        false
    }

    const fn state(&self) -> CircuitState {
        match self.state {
            BreakerState::Closed { .. } => CircuitState::Closed,
            BreakerState::Open { .. } => CircuitState::Open,
            BreakerState::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }
}

/// LLM provider wrapper with a circuit breaker.
///
/// While the circuit is open every call fails fast with
/// `Error::SourceUnavailable`.
pub struct ResilientLlmProvider {
    inner: Box<dyn LlmProvider>,
    breaker: Mutex<CircuitBreaker>,
}

impl ResilientLlmProvider {
    /// Creates a new resilient LLM provider wrapper.
    #[must_use]
    pub fn new(inner: Box<dyn LlmProvider>, config: LlmResilienceConfig) -> Self {
        Self {
            breaker: Mutex::new(CircuitBreaker::new(&config)),
            inner,
        }
    }

    /// Current circuit state.
    #[must_use]
    pub fn circuit_state(&self) -> CircuitState {
        self.lock().state()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CircuitBreaker> {
        self.breaker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn execute<F>(&self, operation: &'static str, call: F) -> Result<String>
    where
        F: FnOnce() -> Result<String>,
    {
        let provider: &'static str = self.inner.name();
        let span = tracing::info_span!(
            "llm.request",
            provider = provider,
            operation = operation,
            status = tracing::field::Empty
        );
        let _enter = span.enter();

        let mut breaker = self.lock();
        let allowed = breaker.allow();
        let state = breaker.state();
        drop(breaker);
        record_breaker_state(provider, state);

        if !allowed {
            span.record("status", "circuit_open");
            metrics::counter!(
                "llm_requests_total",
                "provider" => provider,
                "status" => "circuit_open"
            )
            .increment(1);
            return Err(Error::SourceUnavailable {
                source_name: provider.to_string(),
                cause: "circuit breaker open".to_string(),
            });
        }

        let start = Instant::now();
        let result = call();
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let status = if result.is_ok() { "success" } else { "error" };
        span.record("status", status);

        metrics::counter!(
            "llm_requests_total",
            "provider" => provider,
            "status" => status
        )
        .increment(1);
        metrics::histogram!("llm_request_duration_ms", "provider" => provider).record(elapsed_ms);

        // A malformed reply still proves the backend is up.
        let mut breaker = self.lock();
        let tripped = match &result {
            Ok(_) | Err(Error::MalformedResponse { .. }) => {
                breaker.on_success();
                false
            },
            Err(_) => breaker.on_failure(),
        };
        let state = breaker.state();
        drop(breaker);
        record_breaker_state(provider, state);

        if tripped {
            metrics::counter!("llm_circuit_breaker_trips_total", "provider" => provider)
                .increment(1);
            tracing::warn!(provider = provider, "LLM circuit breaker opened");
        }

        result
    }
}

fn record_breaker_state(provider: &'static str, state: CircuitState) {
    metrics::gauge!("llm_circuit_breaker_state", "provider" => provider).set(state.gauge_value());
}

impl LlmProvider for ResilientLlmProvider {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        self.execute("complete", || self.inner.complete(prompt))
    }

    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        self.execute("complete_with_system", || {
            self.inner.complete_with_system(system, user)
        })
    }
}
