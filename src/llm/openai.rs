//! `OpenAI`-compatible chat completions client.
//!
//! Also serves local OpenAI-compatible servers (LM Studio, vLLM), which
//! accept requests without an API key.

use super::{LlmHttpConfig, LlmProvider, build_http_client, empty_reply, send_json};
use crate::Result;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

const PROVIDER: &str = "openai";

const MAX_TOKENS: u32 = 1024;

/// Some variety between generated items helps the dedup pass.
const TEMPERATURE: f32 = 0.8;

/// `OpenAI` LLM client.
pub struct OpenAiClient {
    /// `None` for keyless local servers.
    api_key: Option<SecretString>,
    endpoint: String,
    model: String,
    timeout_ms: u64,
    client: reqwest::blocking::Client,
}

impl OpenAiClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    /// Creates a client with the default endpoint and model.
    #[must_use]
    pub fn new(api_key: Option<SecretString>) -> Self {
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

    /// Reasoning models take `max_completion_tokens` and reject a custom
    /// temperature.
    fn is_reasoning_model(&self) -> bool {
        ["gpt-5", "o1", "o3", "o4"]
            .iter()
            .any(|prefix| self.model.starts_with(prefix))
    }

    fn chat_body<'a>(&'a self, system: Option<&'a str>, user: &'a str) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatTurn {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatTurn {
            role: "user",
            content: user,
        });

        let reasoning = self.is_reasoning_model();
        ChatRequest {
            model: &self.model,
            messages,
            max_tokens: (!reasoning).then_some(MAX_TOKENS),
            max_completion_tokens: reasoning.then_some(MAX_TOKENS),
            temperature: (!reasoning).then_some(TEMPERATURE),
        }
    }

    fn request(&self, system: Option<&str>, user: &str) -> Result<String> {
        tracing::debug!(provider = PROVIDER, model = %self.model, "Requesting completion");

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .json(&self.chat_body(system, user));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let reply: ChatResponse = send_json(PROVIDER, request, self.timeout_ms)?;
        reply
            .choices
            .into_iter()
            .filter_map(|choice| choice.message.content)
            .find(|text| !text.trim().is_empty())
            .ok_or_else(|| empty_reply(PROVIDER))
    }
}

impl LlmProvider for OpenAiClient {
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
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatTurn<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ReplyMessage,
}

/// `content` is null when the model refuses or only calls tools.
#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}
