//! Engine services.
//!
//! The [`ContentEngine`] ties the pieces together: a [`pool::CategoryPool`]
//! and [`DifficultyController`] per category, a replenisher task per pool,
//! and one [`DeduplicationService`] shared by all of them.

pub mod deduplication;
pub mod difficulty;
mod engine;
pub mod pool;
pub mod replenisher;

pub use deduplication::DeduplicationService;
pub use difficulty::{DifficultyConfig, DifficultyController};
pub use engine::{ContentEngine, ContentEngineBuilder};
pub use pool::{CategoryPool, PoolStats, PoolStatsSnapshot};
