//! Data models for quizpool.
//!
//! Items, difficulty levels, performance samples and signatures shared by
//! every other module.

mod difficulty;
mod item;
mod signature;

pub use difficulty::{DifficultyLevel, DifficultyState, PerformanceSample, PerformanceScore};
pub use item::{ContentItem, ItemId, Provenance};
pub use signature::Signature;
