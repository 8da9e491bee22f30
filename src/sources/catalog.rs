//! Local catalog source.
//!
//! A finite table of pre-authored items, rotated deterministically. The
//! TOML layout is one `[[items]]` table per row:
//!
//! ```toml
//! [[items]]
//! category = "science"
//! topic = "astronomy"
//! body = "Which planet has the most moons?"
//! choices = ["Earth", "Mars", "Saturn", "Venus"]
//! answer = "Saturn"
//! difficulty = "basic"
//! effort_seconds = 20
//! ```

use super::{ContentSource, SourceRequest};
use crate::models::{ContentItem, DifficultyLevel, Provenance};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Maximum catalog file size (8MB).
const MAX_CATALOG_SIZE: u64 = 8 * 1024 * 1024;

/// One pre-authored row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogEntry {
    /// Category the row belongs to.
    pub category: String,
    /// Topic within the category.
    pub topic: String,
    /// Question text.
    pub body: String,
    /// Answer options; may be empty for open questions.
    #[serde(default)]
    pub choices: Vec<String>,
    /// Correct answer.
    #[serde(alias = "canonical_answer")]
    pub answer: String,
    /// Static difficulty tag.
    #[serde(default)]
    pub difficulty: DifficultyLevel,
    /// Expected effort.
    #[serde(default = "default_effort", alias = "estimated_effort_seconds")]
    pub effort_seconds: u32,
    /// Optional explanation.
    #[serde(default)]
    pub explanation: Option<String>,
}

const fn default_effort() -> u32 {
    60
}

impl CatalogEntry {
    fn to_item(&self) -> ContentItem {
        let mut item = ContentItem::new(
            self.category.clone(),
            self.topic.clone(),
            self.body.clone(),
            self.answer.clone(),
            self.difficulty,
            Provenance::Local,
        )
        .with_choices(self.choices.iter().cloned())
        .with_effort_seconds(self.effort_seconds);
        if let Some(explanation) = &self.explanation {
            item = item.with_explanation(explanation.clone());
        }
        item
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    items: Vec<CatalogEntry>,
}

/// Rotation key: category, topic and whether the set was difficulty-filtered.
type CursorKey = (String, String, Option<DifficultyLevel>);

/// Source backed by a fixed table of items.
///
/// For a request, the rows for `(category, topic)` are used; if the topic
/// has none, every row of the category is. Each key keeps its own counter
/// and serves `rows[counter % rows.len()]`, so a non-empty category never
/// runs dry.
pub struct LocalCatalogSource {
    by_category: HashMap<String, Vec<CatalogEntry>>,
    cursors: Mutex<HashMap<CursorKey, usize>>,
    max_attempts: u32,
}

impl LocalCatalogSource {
    /// Default attempts per candidate.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    /// Builds a catalog from entries, keeping their order.
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let mut by_category: HashMap<String, Vec<CatalogEntry>> = HashMap::new();
        for entry in entries {
            by_category
                .entry(entry.category.clone())
                .or_default()
                .push(entry);
        }
        Self {
            by_category,
            cursors: Mutex::new(HashMap::new()),
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Parses a catalog from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the text is not a valid catalog or a
    /// row has an empty category, topic, body or answer.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(contents)
            .map_err(|e| Error::InvalidInput(format!("invalid catalog: {e}")))?;

        for (i, entry) in file.items.iter().enumerate() {
            let blank = [&entry.category, &entry.topic, &entry.body, &entry.answer]
                .iter()
                .any(|field| field.trim().is_empty());
            if blank {
                return Err(Error::InvalidInput(format!(
                    "catalog row {} has an empty required field",
                    i + 1
                )));
            }
        }
        Ok(Self::new(file.items))
    }

    /// Loads a catalog file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path).map_err(|e| Error::OperationFailed {
            operation: "read_catalog_metadata".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        if metadata.len() > MAX_CATALOG_SIZE {
            return Err(Error::InvalidInput(format!(
                "catalog exceeds maximum size of {MAX_CATALOG_SIZE} bytes: {}",
                path.display()
            )));
        }
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_catalog".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        let catalog = Self::from_toml_str(&contents)?;
        tracing::info!(
            path = %path.display(),
            rows = catalog.len(),
            categories = catalog.by_category.len(),
            "Loaded local catalog"
        );
        Ok(catalog)
    }

    /// Sets the attempts per candidate.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Total number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    /// Returns true if the catalog has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_category.is_empty()
    }

    /// Number of rows in a category.
    #[must_use]
    pub fn category_len(&self, category: &str) -> usize {
        self.by_category.get(category).map_or(0, Vec::len)
    }

    /// Next row for `(category, topic)` at any difficulty.
    ///
    /// Returns `None` only for a category with no rows.
    pub fn next(&self, category: &str, topic: &str) -> Option<ContentItem> {
        self.next_matching(category, topic, None)
    }

    fn next_matching(
        &self,
        category: &str,
        topic: &str,
        level: Option<DifficultyLevel>,
    ) -> Option<ContentItem> {
        let rows = self.by_category.get(category)?;
        let matches_level = |e: &&CatalogEntry| level.is_none_or(|l| e.difficulty == l);

        let mut candidates: Vec<&CatalogEntry> = rows
            .iter()
            .filter(|e| e.topic == topic)
            .filter(matches_level)
            .collect();
        let key_topic = if candidates.is_empty() {
            candidates = rows.iter().filter(matches_level).collect();
            ""
        } else {
            topic
        };
        if candidates.is_empty() {
            return None;
        }

        let mut cursors = self
            .cursors
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let counter = cursors
            .entry((category.to_string(), key_topic.to_string(), level))
            .or_insert(0);
        let entry = candidates[*counter % candidates.len()];
        *counter = counter.wrapping_add(1);
        drop(cursors);

        Some(entry.to_item())
    }
}

impl ContentSource for LocalCatalogSource {
    fn name(&self) -> &str {
        "catalog"
    }

    fn fetch(&self, request: &SourceRequest) -> Result<ContentItem> {
        if !self.by_category.contains_key(&request.category) {
            return Err(Error::SourceUnavailable {
                source_name: "catalog".to_string(),
                cause: format!("no rows for category '{}'", request.category),
            });
        }

        let level = request.strict_difficulty.then_some(request.difficulty);
        self.next_matching(&request.category, &request.topic, level)
            .ok_or_else(|| Error::SourceUnavailable {
                source_name: "catalog".to_string(),
                cause: format!(
                    "no '{}' rows at difficulty {}",
                    request.category, request.difficulty
                ),
            })
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
