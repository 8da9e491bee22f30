//! Ollama (local) client.

use super::{LlmHttpConfig, LlmProvider, build_http_client, empty_reply, send_json};
use crate::Result;
use serde::{Deserialize, Serialize};

const PROVIDER: &str = "ollama";

/// Ollama local LLM client.
///
/// Uses `/api/generate` with `format: "json"` so the model is constrained
/// to emit a JSON document.
pub struct OllamaClient {
    endpoint: String,
    model: String,
    timeout_ms: u64,
    client: reqwest::blocking::Client,
}

impl OllamaClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "http://localhost:11434";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "llama3.2";

    /// Creates a client. Honors `OLLAMA_HOST` and `OLLAMA_MODEL` when set.
    #[must_use]
    pub fn new() -> Self {
        let http = LlmHttpConfig::default();
        let endpoint =
            std::env::var("OLLAMA_HOST").unwrap_or_else(|_| Self::DEFAULT_ENDPOINT.to_string());
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: std::env::var("OLLAMA_MODEL")
                .unwrap_or_else(|_| Self::DEFAULT_MODEL.to_string()),
            timeout_ms: http.timeout_ms,
            client: build_http_client(http),
        }
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Rebuilds the HTTP client with the given timeouts.
    #[must_use]
    pub fn with_http_config(mut self, config: LlmHttpConfig) -> Self {
        self.timeout_ms = config.timeout_ms;
        self.client = build_http_client(config);
        self
    }

    /// Checks if the Ollama daemon answers.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/api/tags", self.endpoint))
            .send()
            .is_ok_and(|r| r.status().is_success())
    }

    fn request(&self, system: Option<&str>, prompt: &str) -> Result<String> {
        tracing::debug!(provider = PROVIDER, model = %self.model, "Requesting completion");

        let body = GenerateRequest {
            model: &self.model,
            prompt,
            system,
            format: "json",
            stream: false,
        };
        let request = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .json(&body);

        let reply: GenerateResponse = send_json(PROVIDER, request, self.timeout_ms)?;
        if reply.response.trim().is_empty() {
            return Err(empty_reply(PROVIDER));
        }
        Ok(reply.response)
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmProvider for OllamaClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        self.request(None, prompt)
    }

    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        self.request(Some(system), user)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    format: &'static str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}
