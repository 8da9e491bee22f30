//! Anthropic Messages API client.

use super::{LlmHttpConfig, LlmProvider, build_http_client, empty_reply, send_json};
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

const PROVIDER: &str = "anthropic";

/// Upper bound on generated tokens; one quiz item fits comfortably.
const MAX_TOKENS: u32 = 1024;

/// Anthropic client.
pub struct AnthropicClient {
    api_key: SecretString,
    endpoint: String,
    model: String,
    timeout_ms: u64,
    client: reqwest::blocking::Client,
}

impl AnthropicClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.anthropic.com/v1";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "claude-3-5-haiku-latest";

    /// Creates a client with the default endpoint and model.
    #[must_use]
    pub fn new(api_key: SecretString) -> Self {
        let http = LlmHttpConfig::default();
        Self {
            api_key,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
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

    /// Keys start with `sk-ant-`, are at least 40 characters and use only
    /// alphanumerics, hyphens and underscores.
    fn has_valid_key(&self) -> bool {
        let key = self.api_key.expose_secret();
        key.starts_with("sk-ant-")
            && key.len() >= 40
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    fn request(&self, system: Option<&str>, user: &str) -> Result<String> {
        // A bad key will never work; no point retrying it.
        if !self.has_valid_key() {
            return Err(Error::SourceUnavailable {
                source_name: PROVIDER.to_string(),
                cause: "API key does not look like an Anthropic key".to_string(),
            });
        }
        tracing::debug!(provider = PROVIDER, model = %self.model, "Requesting completion");

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system,
            messages: [Message {
                role: "user",
                content: user,
            }],
        };
        let request = self
            .client
            .post(format!("{}/messages", self.endpoint))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", "2023-06-01")
            .json(&body);

        let reply: MessagesResponse = send_json(PROVIDER, request, self.timeout_ms)?;
        reply
            .content
            .into_iter()
            .find(|block| block.kind == "text" && !block.text.trim().is_empty())
            .map(|block| block.text)
            .ok_or_else(|| empty_reply(PROVIDER))
    }
}

impl LlmProvider for AnthropicClient {
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
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}
