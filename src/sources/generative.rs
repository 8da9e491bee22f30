//! LLM-backed generative source.

use super::{ContentSource, SourceRequest};
use crate::config::GenerationSettings;
use crate::llm::{
    GENERATION_SYSTEM_PROMPT, LlmProvider, build_generation_prompt, extract_json_from_response,
};
use crate::models::{ContentItem, Provenance};
use crate::{Error, Result};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const SOURCE_NAME: &str = "generative";

/// Number of choices a generated item must carry.
const REQUIRED_CHOICES: usize = 4;

/// Source that asks a generative backend for items.
///
/// Produces items at exactly the requested difficulty, so it is only ever
/// consulted in the strict pass.
pub struct GenerativeSource {
    provider: Arc<dyn LlmProvider>,
    timeout: Duration,
    max_attempts: u32,
    default_effort_seconds: u32,
}

impl GenerativeSource {
    /// Default attempts per candidate.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    /// Creates a generative source with default settings.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self::from_settings(provider, &GenerationSettings::default())
    }

    /// Creates a generative source from generation settings.
    #[must_use]
    pub fn from_settings(provider: Arc<dyn LlmProvider>, settings: &GenerationSettings) -> Self {
        Self {
            provider,
            timeout: settings.timeout,
            max_attempts: settings.max_attempts.max(1),
            default_effort_seconds: settings.default_effort_seconds,
        }
    }

    /// Sets the per-call time budget.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the attempts per candidate.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Name of the backend behind this source.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }
}

impl ContentSource for GenerativeSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn fetch(&self, request: &SourceRequest) -> Result<ContentItem> {
        let prompt = build_generation_prompt(
            &request.category,
            &request.topic,
            request.difficulty,
            &request.avoid,
        );

        tracing::debug!(
            provider = self.provider.name(),
            category = %request.category,
            topic = %request.topic,
            difficulty = %request.difficulty,
            avoid = request.avoid.len(),
            "Requesting generated item"
        );

        let raw = self
            .provider
            .complete_with_system(GENERATION_SYSTEM_PROMPT, &prompt)
            .map_err(|e| match e {
                Error::SourceTimeout { .. }
                | Error::SourceUnavailable { .. }
                | Error::MalformedResponse { .. } => e,
                other => Error::SourceUnavailable {
                    source_name: SOURCE_NAME.to_string(),
                    cause: other.to_string(),
                },
            })?;

        parse_generated_item(SOURCE_NAME, &raw, request, self.default_effort_seconds)
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn adapts_difficulty(&self) -> bool {
        true
    }
}

#[derive(Debug, Deserialize)]
struct GeneratedItem {
    #[serde(alias = "question")]
    body: String,
    #[serde(default)]
    choices: Vec<String>,
    #[serde(alias = "answer")]
    canonical_answer: String,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    knowledge_points: Vec<String>,
    #[serde(default)]
    estimated_effort_seconds: u32,
}

/// Parses backend output into an item for `request`.
///
/// Accepts a bare JSON object or one wrapped in a markdown fence. The
/// answer must be one of the four choices, either verbatim or as a letter
/// `A`-`D`. A missing or zero effort estimate falls back to
/// `default_effort_seconds`.
///
/// # Errors
///
/// Returns `Error::MalformedResponse` if the output does not describe a
/// usable item.
pub fn parse_generated_item(
    source_name: &str,
    raw: &str,
    request: &SourceRequest,
    default_effort_seconds: u32,
) -> Result<ContentItem> {
    let malformed = |cause: String| Error::MalformedResponse {
        source_name: source_name.to_string(),
        cause,
    };

    let json = extract_json_from_response(raw);
    let generated: GeneratedItem =
        serde_json::from_str(json).map_err(|e| malformed(format!("invalid JSON: {e}")))?;

    let body = generated.body.trim();
    if body.is_empty() {
        return Err(malformed("empty body".to_string()));
    }

    let choices: Vec<String> = generated
        .choices
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    if choices.len() != REQUIRED_CHOICES {
        return Err(malformed(format!(
            "expected {REQUIRED_CHOICES} choices, got {}",
            choices.len()
        )));
    }
    if choices.iter().any(String::is_empty) {
        return Err(malformed("empty choice".to_string()));
    }

    let answer = resolve_answer(generated.canonical_answer.trim(), &choices)
        .ok_or_else(|| malformed("answer is not one of the choices".to_string()))?;

    let effort = if generated.estimated_effort_seconds == 0 {
        default_effort_seconds
    } else {
        generated.estimated_effort_seconds
    };

    let mut item = ContentItem::new(
        request.category.clone(),
        request.topic.clone(),
        body,
        answer,
        request.difficulty,
        Provenance::Generative,
    )
    .with_choices(choices)
    .with_effort_seconds(effort)
    .with_knowledge_points(generated.knowledge_points);
    if let Some(explanation) = generated.explanation.filter(|e| !e.trim().is_empty()) {
        item = item.with_explanation(explanation);
    }
    Ok(item)
}

/// Maps an answer to its choice text, accepting a bare letter `A`-`D`.
fn resolve_answer(answer: &str, choices: &[String]) -> Option<String> {
    if let Some(choice) = choices.iter().find(|c| c.eq_ignore_ascii_case(answer)) {
        return Some(choice.clone());
    }

    let letter = answer.trim_end_matches(['.', ')']);
    let mut chars = letter.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        let index = match c.to_ascii_uppercase() {
            'A' => 0,
            'B' => 1,
            'C' => 2,
            'D' => 3,
            _ => return None,
        };
        return choices.get(index).cloned();
    }
    None
}
