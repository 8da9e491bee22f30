//! Content engine.
//!
//! Owns one pool, one difficulty controller and one replenisher task per
//! category. Sources and the fingerprint store are injected at build time;
//! nothing is global.

use super::deduplication::DeduplicationService;
use super::difficulty::DifficultyController;
use super::pool::{CategoryPool, PoolStatsSnapshot};
use super::replenisher::{Replenisher, SourceList};
use crate::config::{CategorySpec, QuizPoolConfig};
use crate::llm::provider_from_config;
use crate::models::{ContentItem, DifficultyState, PerformanceSample};
use crate::sources::{ContentSource, GenerativeSource, LocalCatalogSource};
use crate::storage::{FilesystemFingerprintStore, FingerprintStore, MemoryFingerprintStore};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::instrument;

/// Per-category runtime state.
struct CategoryHandle {
    pool: Arc<CategoryPool>,
    controller: Arc<Mutex<DifficultyController>>,
}

/// Background tasks of a started engine.
struct Workers {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

/// Builder for [`ContentEngine`].
pub struct ContentEngineBuilder {
    config: QuizPoolConfig,
    sources: Vec<Arc<dyn ContentSource>>,
    store: Option<Arc<dyn FingerprintStore>>,
}

impl ContentEngineBuilder {
    /// Appends a source. Sources are consulted in the order added.
    #[must_use]
    pub fn with_source<S: ContentSource + 'static>(self, source: S) -> Self {
        self.with_shared_source(Arc::new(source))
    }

    /// Appends a shared source.
    #[must_use]
    pub fn with_shared_source(mut self, source: Arc<dyn ContentSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Sets the fingerprint store.
    #[must_use]
    pub fn with_store<S: FingerprintStore + 'static>(self, store: S) -> Self {
        self.with_shared_store(Arc::new(store))
    }

    /// Sets a shared fingerprint store.
    #[must_use]
    pub fn with_shared_store(mut self, store: Arc<dyn FingerprintStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Builds the engine.
    ///
    /// Without an explicit store, `store.path` selects a file-backed store
    /// and its absence an in-memory one.
    #[must_use]
    pub fn build(self) -> ContentEngine {
        let store = self.store.unwrap_or_else(|| default_store(&self.config));
        let dedup = Arc::new(DeduplicationService::new(self.config.dedup.clone(), store));

        ContentEngine {
            config: self.config,
            sources: self.sources.into(),
            dedup,
            categories: RwLock::new(HashMap::new()),
            workers: Mutex::new(None),
        }
    }
}

fn default_store(config: &QuizPoolConfig) -> Arc<dyn FingerprintStore> {
    match &config.store.path {
        Some(path) => Arc::new(FilesystemFingerprintStore::with_capacity(
            path.clone(),
            config.store.capacity,
        )),
        None => Arc::new(MemoryFingerprintStore::with_capacity(config.store.capacity)),
    }
}

/// Adaptive content pool engine.
///
/// `get_item`, `submit_result` and `pool_status` are synchronous and only
/// take short locks, so they are safe to call from async and sync code
/// alike.
///
/// # Example
///
/// ```rust,no_run
/// use quizpool::{CategorySpec, ContentEngine, LocalCatalogSource, QuizPoolConfig};
///
/// # async fn demo(catalog: LocalCatalogSource) -> quizpool::Result<()> {
/// let engine = ContentEngine::builder(QuizPoolConfig::default())
///     .with_source(catalog)
///     .build();
/// engine.start(vec![CategorySpec::new("history")], 10, 3)?;
///
/// if let Some(item) = engine.get_item("history") {
///     let state = engine.submit_result("history", &item, true, 4_200)?;
///     println!("next level: {}", state.level);
/// }
/// engine.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct ContentEngine {
    config: QuizPoolConfig,
    sources: SourceList,
    dedup: Arc<DeduplicationService>,
    categories: RwLock<HashMap<String, CategoryHandle>>,
    workers: Mutex<Option<Workers>>,
}

impl ContentEngine {
    /// Starts building an engine.
    #[must_use]
    pub fn builder(config: QuizPoolConfig) -> ContentEngineBuilder {
        ContentEngineBuilder {
            config,
            sources: Vec::new(),
            store: None,
        }
    }

    /// Builds an engine with the sources the configuration describes.
    ///
    /// The local catalog (if `catalog_path` is set) comes first and the
    /// generative source (if an LLM provider is set) second.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded or the LLM provider
    /// is misconfigured.
    pub fn from_config(config: QuizPoolConfig) -> Result<Self> {
        let catalog = config
            .catalog_path
            .as_deref()
            .map(LocalCatalogSource::load)
            .transpose()?;
        let provider = provider_from_config(&config.llm)?;
        let generation = config.generation.clone();

        let mut builder = Self::builder(config);
        if let Some(catalog) = catalog {
            builder = builder.with_source(catalog);
        }
        if let Some(provider) = provider {
            builder = builder.with_source(GenerativeSource::from_settings(provider, &generation));
        }
        if builder.sources.is_empty() {
            tracing::warn!("No content sources configured; pools will stay empty");
        }
        Ok(builder.build())
    }

    /// Engine configuration.
    #[must_use]
    pub const fn config(&self) -> &QuizPoolConfig {
        &self.config
    }

    /// Deduplication service shared by every category.
    #[must_use]
    pub const fn dedup(&self) -> &Arc<DeduplicationService> {
        &self.dedup
    }

    /// Names of the registered sources, in walk order.
    #[must_use]
    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Returns true between `start` and `stop`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.workers().is_some()
    }

    /// Allocates pools and spawns one replenisher per category.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for a zero capacity, a low-water mark
    /// above capacity, an empty or repeated category name, or an engine that
    /// is already running. Returns `Error::OperationFailed` when called
    /// outside a Tokio runtime.
    #[instrument(skip(self, categories), fields(operation = "engine_start", categories = categories.len()))]
    pub fn start(
        &self,
        categories: Vec<CategorySpec>,
        capacity: usize,
        low_water_mark: usize,
    ) -> Result<()> {
        if capacity == 0 {
            return Err(Error::InvalidInput("capacity must be positive".to_string()));
        }
        if low_water_mark > capacity {
            return Err(Error::InvalidInput(format!(
                "low_water_mark ({low_water_mark}) exceeds capacity ({capacity})"
            )));
        }
        let mut seen = HashSet::new();
        for spec in &categories {
            if spec.name.trim().is_empty() {
                return Err(Error::InvalidInput("category name is empty".to_string()));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "category '{}' listed twice",
                    spec.name
                )));
            }
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| Error::OperationFailed {
            operation: "engine_start".to_string(),
            cause: e.to_string(),
        })?;

        let mut workers = self.workers();
        if workers.is_some() {
            return Err(Error::InvalidInput("engine already started".to_string()));
        }

        let settings = self
            .config
            .pool
            .clone()
            .with_bounds(capacity, low_water_mark);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut handles = HashMap::with_capacity(categories.len());
        let mut tasks = Vec::with_capacity(categories.len());

        for spec in categories {
            let name = spec.name.clone();
            let pool = Arc::new(CategoryPool::new(spec, &settings));
            let controller = Arc::new(Mutex::new(DifficultyController::new(
                self.config.difficulty.clone(),
            )));
            let replenisher = Replenisher::new(
                Arc::clone(&pool),
                Arc::clone(&controller),
                Arc::clone(&self.sources),
                Arc::clone(&self.dedup),
                settings.clone(),
            );
            tasks.push(runtime.spawn(replenisher.run(shutdown_rx.clone())));
            handles.insert(name, CategoryHandle { pool, controller });
        }

        tracing::info!(
            categories = handles.len(),
            capacity = capacity,
            low_water_mark = low_water_mark,
            sources = ?self.source_names(),
            "Content engine started"
        );
        *self
            .categories
            .write()
            .unwrap_or_else(PoisonError::into_inner) = handles;
        *workers = Some(Workers { shutdown, tasks });
        Ok(())
    }

    /// Signals every replenisher to stop and waits for them.
    ///
    /// Items already pooled stay available to `get_item`. A source call in
    /// flight is left to finish on its blocking thread.
    pub async fn stop(&self) {
        let Some(workers) = self.workers().take() else {
            return;
        };

        let _ = workers.shutdown.send(true);
        for task in workers.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Replenisher task failed");
            }
        }
        tracing::info!("Content engine stopped");
    }

    /// Takes the oldest ready item of a category.
    ///
    /// Never blocks on a source. Returns `None` for an unknown category or
    /// an empty pool.
    #[must_use]
    pub fn get_item(&self, category: &str) -> Option<ContentItem> {
        let pool = self.pool(category)?;
        let item = pool.dequeue();
        if item.is_none() {
            tracing::debug!(category = category, "Pool empty");
        }
        item
    }

    /// Feeds one answer back into the category's difficulty controller.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for an unknown category.
    #[instrument(skip(self, item), fields(operation = "submit_result", item_id = %item.id))]
    pub fn submit_result(
        &self,
        category: &str,
        item: &ContentItem,
        correct: bool,
        response_time_ms: i64,
    ) -> Result<DifficultyState> {
        let controller = self
            .controller(category)
            .ok_or_else(|| Error::InvalidInput(format!("unknown category '{category}'")))?;
        let sample = PerformanceSample::new(correct, response_time_ms, item.expected_time_ms());
        let state = controller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .submit_result(sample);
        Ok(state)
    }

    /// Occupancy of every pool. No side effects.
    #[must_use]
    pub fn pool_status(&self) -> HashMap<String, usize> {
        self.categories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, handle)| (name.clone(), handle.pool.len()))
            .collect()
    }

    /// Current difficulty state of a category.
    #[must_use]
    pub fn difficulty(&self, category: &str) -> Option<DifficultyState> {
        self.controller(category).map(|controller| {
            controller
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .state()
                .clone()
        })
    }

    /// Counters of a category's pool.
    #[must_use]
    pub fn pool_stats(&self, category: &str) -> Option<PoolStatsSnapshot> {
        self.pool(category).map(|pool| pool.stats().snapshot())
    }

    fn pool(&self, category: &str) -> Option<Arc<CategoryPool>> {
        self.categories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(category)
            .map(|handle| Arc::clone(&handle.pool))
    }

    fn controller(&self, category: &str) -> Option<Arc<Mutex<DifficultyController>>> {
        self.categories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(category)
            .map(|handle| Arc::clone(&handle.controller))
    }

    fn workers(&self) -> MutexGuard<'_, Option<Workers>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DifficultyLevel, Provenance};
    use crate::sources::SourceRequest;
    use sha2::{Digest, Sha256};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct Numbered {
        calls: AtomicU32,
    }

    impl ContentSource for Numbered {
        fn name(&self) -> &str {
            "numbered"
        }

        fn fetch(&self, request: &SourceRequest) -> Result<ContentItem> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let digest = hex::encode(Sha256::digest(n.to_le_bytes()));
            let body = digest
                .as_bytes()
                .chunks(4)
                .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                .collect::<Vec<_>>()
                .join(" ");
            Ok(ContentItem::new(
                request.category.clone(),
                request.topic.clone(),
                body,
                "x",
                request.difficulty,
                Provenance::Local,
            ))
        }

        fn max_attempts(&self) -> u32 {
            5
        }
    }

    fn engine() -> ContentEngine {
        ContentEngine::builder(QuizPoolConfig::default())
            .with_source(Numbered {
                calls: AtomicU32::new(0),
            })
            .build()
    }

    async fn wait_for(engine: &ContentEngine, category: &str, occupancy: usize) {
        for _ in 0..200 {
            if engine.pool_status().get(category) == Some(&occupancy) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("pool '{category}' never reached {occupancy}");
    }

    #[test]
    fn test_start_requires_runtime() {
        let err = engine()
            .start(vec![CategorySpec::new("a")], 3, 1)
            .unwrap_err();
        assert!(matches!(err, Error::OperationFailed { .. }));
    }

    #[tokio::test]
    async fn test_start_validates_bounds() {
        let engine = engine();
        assert!(engine.start(vec![CategorySpec::new("a")], 0, 0).is_err());
        assert!(engine.start(vec![CategorySpec::new("a")], 3, 4).is_err());
        assert!(
            engine
                .start(vec![CategorySpec::new("a"), CategorySpec::new("a")], 3, 1)
                .is_err()
        );
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn test_start_fill_serve_stop() {
        let engine = engine();
        engine
            .start(vec![CategorySpec::new("a"), CategorySpec::new("b")], 4, 1)
            .unwrap();
        assert!(engine.is_running());
        assert!(engine.start(vec![CategorySpec::new("c")], 4, 1).is_err());

        wait_for(&engine, "a", 4).await;
        wait_for(&engine, "b", 4).await;

        let item = engine.get_item("a").unwrap();
        assert_eq!(item.category, "a");
        assert!(engine.get_item("missing").is_none());
        assert_eq!(engine.pool_stats("a").unwrap().served, 1);

        engine.stop().await;
        assert!(!engine.is_running());
        engine.stop().await;
    }

    #[tokio::test]
    async fn test_submit_result_unknown_category() {
        let engine = engine();
        engine.start(vec![CategorySpec::new("a")], 2, 1).unwrap();
        let item = ContentItem::new(
            "zzz",
            "t",
            "b",
            "x",
            DifficultyLevel::Basic,
            Provenance::Local,
        );
        assert!(matches!(
            engine.submit_result("zzz", &item, true, 1_000),
            Err(Error::InvalidInput(_))
        ));
        engine.stop().await;
    }

    #[tokio::test]
    async fn test_submit_result_updates_difficulty() {
        let engine = engine();
        engine.start(vec![CategorySpec::new("a")], 2, 1).unwrap();
        wait_for(&engine, "a", 2).await;

        let item = engine.get_item("a").unwrap();
        let before = engine.difficulty("a").unwrap();
        assert_eq!(before.level, DifficultyLevel::Intermediate);

        let mut state = before;
        for _ in 0..3 {
            state = engine.submit_result("a", &item, true, 1_000).unwrap();
        }
        assert_eq!(state.level, DifficultyLevel::Advanced);
        assert_eq!(engine.difficulty("a").unwrap().level, DifficultyLevel::Advanced);
        engine.stop().await;
    }
}
