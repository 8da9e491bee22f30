//! Content source adapters.
//!
//! A source turns a [`SourceRequest`] into one candidate [`ContentItem`].
//! Sources are blocking and run on Tokio's blocking pool, each call bounded
//! by [`ContentSource::timeout`]. The replenisher walks them in the order
//! they were registered.

mod catalog;
mod generative;

pub use catalog::{CatalogEntry, LocalCatalogSource};
pub use generative::{GenerativeSource, parse_generated_item};

use crate::Result;
use crate::models::{ContentItem, DifficultyLevel};
use std::time::Duration;

/// Default time budget for one source call.
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

/// One request for a candidate item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    /// Category the item is for.
    pub category: String,
    /// Topic from the category's rotation.
    pub topic: String,
    /// Level the difficulty controller currently asks for.
    pub difficulty: DifficultyLevel,
    /// When true, a source must not serve another level.
    pub strict_difficulty: bool,
    /// Summaries of recently admitted items the source should not repeat.
    pub avoid: Vec<String>,
}

impl SourceRequest {
    /// Creates a strict request with an empty avoid list.
    #[must_use]
    pub fn new(
        category: impl Into<String>,
        topic: impl Into<String>,
        difficulty: DifficultyLevel,
    ) -> Self {
        Self {
            category: category.into(),
            topic: topic.into(),
            difficulty,
            strict_difficulty: true,
            avoid: Vec::new(),
        }
    }

    /// Sets whether other difficulty levels are acceptable.
    #[must_use]
    pub const fn with_strict_difficulty(mut self, strict: bool) -> Self {
        self.strict_difficulty = strict;
        self
    }

    /// Sets the avoid list.
    #[must_use]
    pub fn with_avoid(mut self, avoid: Vec<String>) -> Self {
        self.avoid = avoid;
        self
    }
}

/// Trait for content sources.
///
/// # Errors
///
/// `fetch` reports why no candidate was produced:
///
/// | Error | Replenisher reaction |
/// |-------|----------------------|
/// | `SourceTimeout`, `MalformedResponse` | retry with the next topic |
/// | `SourceUnavailable` | move on to the next source |
/// | anything else | move on to the next source |
pub trait ContentSource: Send + Sync {
    /// Short name used in logs and metrics.
    fn name(&self) -> &str;

    /// Produces one candidate item.
    ///
    /// # Errors
    ///
    /// See the trait-level table.
    fn fetch(&self, request: &SourceRequest) -> Result<ContentItem>;

    /// Attempts per candidate before the replenisher gives up on this
    /// source for the rest of the cycle.
    fn max_attempts(&self) -> u32 {
        1
    }

    /// Time budget for one `fetch` call.
    fn timeout(&self) -> Duration {
        DEFAULT_SOURCE_TIMEOUT
    }

    /// Whether the source produces items at whatever level is requested.
    ///
    /// Sources that do not are asked again with `strict_difficulty = false`
    /// when no source could serve the requested level.
    fn adapts_difficulty(&self) -> bool {
        false
    }
}
