//! Content item types and identifiers.

use super::DifficultyLevel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a content item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Creates a new item ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh time-ordered ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Where an item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Pre-authored local catalog.
    Local,
    /// Produced by the generative backend.
    Generative,
}

impl Provenance {
    /// Returns the provenance as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Generative => "generative",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single quiz item.
///
/// Items are created by a source, admitted or discarded by deduplication,
/// and handed out exactly once by the pool. Nothing in the engine mutates
/// an item after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Unique identifier.
    pub id: ItemId,
    /// Top-level category (pool key).
    pub category: String,
    /// Topic within the category.
    pub topic: String,
    /// Question text.
    pub body: String,
    /// Ordered answer choices; empty for open questions.
    #[serde(default)]
    pub choices: Vec<String>,
    /// The expected answer.
    pub canonical_answer: String,
    /// Difficulty tag.
    pub difficulty: DifficultyLevel,
    /// Where the item came from.
    pub provenance: Provenance,
    /// Expected time to answer, in seconds.
    pub estimated_effort_seconds: u32,
    /// Optional explanation of the answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Knowledge points the item exercises.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub knowledge_points: Vec<String>,
}

impl ContentItem {
    /// Creates an item with a generated ID and no choices.
    #[must_use]
    pub fn new(
        category: impl Into<String>,
        topic: impl Into<String>,
        body: impl Into<String>,
        canonical_answer: impl Into<String>,
        difficulty: DifficultyLevel,
        provenance: Provenance,
    ) -> Self {
        Self {
            id: ItemId::generate(),
            category: category.into(),
            topic: topic.into(),
            body: body.into(),
            choices: Vec::new(),
            canonical_answer: canonical_answer.into(),
            difficulty,
            provenance,
            estimated_effort_seconds: 60,
            explanation: None,
            knowledge_points: Vec::new(),
        }
    }

    /// Sets the ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<ItemId>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the answer choices.
    #[must_use]
    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the estimated effort in seconds.
    #[must_use]
    pub const fn with_effort_seconds(mut self, seconds: u32) -> Self {
        self.estimated_effort_seconds = seconds;
        self
    }

    /// Sets the explanation.
    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    /// Sets the knowledge points.
    #[must_use]
    pub fn with_knowledge_points(mut self, points: Vec<String>) -> Self {
        self.knowledge_points = points;
        self
    }

    /// Expected answer time in milliseconds.
    #[must_use]
    pub fn expected_time_ms(&self) -> i64 {
        i64::from(self.estimated_effort_seconds) * 1000
    }

    /// Short one-line summary used in avoid lists.
    ///
    /// Format: `"topic: <first 80 chars of body>"`.
    #[must_use]
    pub fn summary(&self) -> String {
        const MAX_CHARS: usize = 80;
        let body: String = self.body.chars().take(MAX_CHARS).collect();
        if self.body.chars().count() > MAX_CHARS {
            format!("{}: {}...", self.topic, body.trim_end())
        } else {
            format!("{}: {}", self.topic, body)
        }
    }
}
