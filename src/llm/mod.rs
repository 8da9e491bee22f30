//! LLM client abstraction.
//!
//! Provides a unified blocking interface over the generative backends the
//! [`GenerativeSource`](crate::sources::GenerativeSource) talks to.

mod anthropic;
mod ollama;
mod openai;
pub mod prompt;
mod resilience;

pub use anthropic::AnthropicClient;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use prompt::{GENERATION_SYSTEM_PROMPT, build_generation_prompt};
pub use resilience::{CircuitState, LlmResilienceConfig, ResilientLlmProvider};

use crate::config::{LlmConfig, env_parse};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Trait for LLM providers.
pub trait LlmProvider: Send + Sync {
    /// The provider name.
    fn name(&self) -> &'static str;

    /// Generates a completion for the given prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails.
    fn complete(&self, prompt: &str) -> Result<String>;

    /// Generates a completion with a system prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails.
    ///
    /// Default implementation concatenates system and user prompts.
    /// Providers should override this to use native system prompt support.
    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        let combined = format!("{system}\n\n---\n\nUser message:\n{user}");
        self.complete(&combined)
    }
}

/// HTTP client configuration for LLM providers.
#[derive(Debug, Clone, Copy)]
pub struct LlmHttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for LlmHttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
        }
    }
}

impl LlmHttpConfig {
    /// Loads HTTP configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Loads HTTP configuration from config file settings.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut settings = Self::default();
        if let Some(timeout_ms) = config.timeout_ms {
            settings.timeout_ms = timeout_ms;
        }
        if let Some(connect_timeout_ms) = config.connect_timeout_ms {
            settings.connect_timeout_ms = connect_timeout_ms;
        }
        settings
    }

    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(timeout_ms) = env_parse("QUIZPOOL_LLM_TIMEOUT_MS") {
            self.timeout_ms = timeout_ms;
        }
        if let Some(connect_timeout_ms) = env_parse("QUIZPOOL_LLM_CONNECT_TIMEOUT_MS") {
            self.connect_timeout_ms = connect_timeout_ms;
        }
        self
    }
}

/// Builds a blocking HTTP client for LLM requests with configured timeouts.
#[must_use]
pub fn build_http_client(config: LlmHttpConfig) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build LLM HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}

/// Longest error body kept in an error message.
const MAX_ERROR_BODY: usize = 200;

/// Sends a JSON request and decodes the JSON reply.
///
/// Transport failures map onto source errors so the replenisher can tell
/// a slow backend (`SourceTimeout`, retried) from one that is down or
/// refusing the request (`SourceUnavailable`, skipped). A reply that is
/// not the expected envelope is `MalformedResponse`.
pub(crate) fn send_json<T: DeserializeOwned>(
    provider: &'static str,
    request: reqwest::blocking::RequestBuilder,
    timeout_ms: u64,
) -> Result<T> {
    let response = request.send().map_err(|e| {
        tracing::warn!(provider = provider, error = %e, "LLM request failed");
        if e.is_timeout() {
            Error::SourceTimeout {
                source_name: provider.to_string(),
                timeout_ms,
            }
        } else {
            let kind = if e.is_connect() { "connect" } else { "request" };
            Error::SourceUnavailable {
                source_name: provider.to_string(),
                cause: format!("{kind} error: {e}"),
            }
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        let body: String = body.chars().take(MAX_ERROR_BODY).collect();
        tracing::warn!(provider = provider, status = %status, "LLM API returned error status");
        return Err(Error::SourceUnavailable {
            source_name: provider.to_string(),
            cause: format!("status {status}: {body}"),
        });
    }

    response.json().map_err(|e| Error::MalformedResponse {
        source_name: provider.to_string(),
        cause: format!("unexpected reply envelope: {e}"),
    })
}

/// Error for a well-formed reply that carries no completion text.
pub(crate) fn empty_reply(provider: &'static str) -> Error {
    Error::MalformedResponse {
        source_name: provider.to_string(),
        cause: "reply contained no text".to_string(),
    }
}

/// Builds the configured provider wrapped in a circuit breaker.
///
/// Returns `Ok(None)` when no provider is configured.
///
/// # Errors
///
/// Returns `Error::InvalidInput` if a hosted provider has no API key.
pub fn provider_from_config(config: &LlmConfig) -> Result<Option<Arc<dyn LlmProvider>>> {
    use crate::config::LlmProvider as Kind;

    let Some(kind) = config.provider else {
        return Ok(None);
    };
    let http = LlmHttpConfig::from_config(config).with_env_overrides();

    let inner: Box<dyn LlmProvider> = match kind {
        Kind::Anthropic => {
            let key = config.api_key.clone().ok_or_else(|| {
                Error::InvalidInput("anthropic provider requires llm.api_key".to_string())
            })?;
            let mut client = AnthropicClient::new(key).with_http_config(http);
            if let Some(model) = &config.model {
                client = client.with_model(model.clone());
            }
            if let Some(url) = &config.base_url {
                client = client.with_endpoint(url.clone());
            }
            Box::new(client)
        },
        Kind::OpenAi => {
            let mut client = OpenAiClient::new(config.api_key.clone()).with_http_config(http);
            if let Some(model) = &config.model {
                client = client.with_model(model.clone());
            }
            if let Some(url) = &config.base_url {
                client = client.with_endpoint(url.clone());
            }
            Box::new(client)
        },
        Kind::Ollama => {
            let mut client = OllamaClient::new().with_http_config(http);
            if let Some(model) = &config.model {
                client = client.with_model(model.clone());
            }
            if let Some(url) = &config.base_url {
                client = client.with_endpoint(url.clone());
            }
            Box::new(client)
        },
    };

    let resilience = LlmResilienceConfig::from_config(config).with_env_overrides();
    Ok(Some(Arc::new(ResilientLlmProvider::new(inner, resilience))))
}

/// Extracts JSON from LLM response, handling markdown code blocks.
#[must_use]
pub fn extract_json_from_response(response: &str) -> &str {
    let trimmed = response.trim();

    // ```json ... ```
    if let Some(start) = trimmed.find("```json") {
        let json_start = start + 7;
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // ``` ... ``` without a language marker
    if let Some(start) = trimmed.find("```") {
        let content_start = start + 3;
        let after_marker = &trimmed[content_start..];
        let json_start = after_marker
            .find('{')
            .map_or(content_start, |pos| content_start + pos);
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // Raw object: first { to last }
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            if end > start {
                return &trimmed[start..=end];
            }
        }
    }

    trimmed
}
