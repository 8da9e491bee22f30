//! Background replenishment for one category.
//!
//! Each category runs one task that sleeps until a timer fires, a
//! low-water signal arrives or shutdown is requested. A cycle then walks
//! the ordered source list until the pool is back at its target:
//!
//! ```text
//! strict pass    catalog ──► generative ──► ...   (requested difficulty only)
//!                   │ SourceUnavailable: skip for the rest of this pass
//!                   │ timeout / malformed / duplicate: retry, next topic
//!                   │ attempts exhausted: skip for the rest of the cycle
//! relaxed pass   sources that do not adapt difficulty, any level
//! both empty     abandon the cycle, retry on the next tick
//! ```

use super::deduplication::DeduplicationService;
use super::difficulty::DifficultyController;
use super::pool::CategoryPool;
use crate::config::PoolSettings;
use crate::models::{ContentItem, DifficultyLevel};
use crate::sources::{ContentSource, SourceRequest};
use crate::{Error, Result};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::watch;

/// Ordered source list shared by every category.
pub type SourceList = Arc<[Arc<dyn ContentSource>]>;

/// Keeps one category's pool topped up.
pub struct Replenisher {
    pool: Arc<CategoryPool>,
    controller: Arc<Mutex<DifficultyController>>,
    sources: SourceList,
    dedup: Arc<DeduplicationService>,
    settings: PoolSettings,
}

impl Replenisher {
    /// Creates a replenisher for one pool.
    #[must_use]
    pub fn new(
        pool: Arc<CategoryPool>,
        controller: Arc<Mutex<DifficultyController>>,
        sources: SourceList,
        dedup: Arc<DeduplicationService>,
        settings: PoolSettings,
    ) -> Self {
        Self {
            pool,
            controller,
            sources,
            dedup,
            settings,
        }
    }

    /// Runs until `shutdown` flips to true or its sender is dropped.
    ///
    /// The first cycle starts immediately so a fresh pool fills without
    /// waiting for a timer.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            category = self.pool.name(),
            capacity = self.pool.capacity(),
            low_water_mark = self.pool.low_water_mark(),
            sources = self.sources.len(),
            "Replenisher started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            self.run_cycle(&shutdown).await;

            let delay = self.settings.interval_for(self.pool.len());
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = self.pool.notified() => {
                    tracing::debug!(category = self.pool.name(), "Woken by low-water signal");
                }
                () = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!(category = self.pool.name(), "Replenisher stopped");
    }

    /// Refills the pool to its target, unless it is already there or
    /// another cycle is in flight.
    ///
    /// Returns the number of items admitted.
    pub async fn run_cycle(&self, shutdown: &watch::Receiver<bool>) -> usize {
        let target = self.settings.effective_target();
        if self.pool.len() >= target {
            return 0;
        }
        let Some(_guard) = self.pool.try_begin_replenish() else {
            return 0;
        };

        let category = self.pool.name().to_string();
        let stats = self.pool.stats();
        stats.record_cycle_started();
        let start = Instant::now();
        tracing::debug!(
            category = %category,
            occupancy = self.pool.len(),
            target = target,
            "Replenishment cycle started"
        );

        // Per source: [skipped in the strict pass, skipped in the relaxed pass].
        let mut skipped = vec![[false; 2]; self.sources.len()];
        let mut admitted = 0;
        while self.pool.len() < target {
            let item = match self.next_candidate(&mut skipped, shutdown).await {
                Next::Item(item) => item,
                Next::Stop => {
                    metrics::counter!(
                        "replenish_cycles_total",
                        "category" => category.clone(),
                        "outcome" => "interrupted"
                    )
                    .increment(1);
                    tracing::debug!(
                        category = %category,
                        admitted = admitted,
                        "Cycle interrupted by shutdown"
                    );
                    return admitted;
                },
                Next::Abandon => {
                    stats.record_cycle_abandoned();
                    metrics::counter!(
                        "replenish_cycles_total",
                        "category" => category.clone(),
                        "outcome" => "abandoned"
                    )
                    .increment(1);
                    tracing::warn!(
                        category = %category,
                        occupancy = self.pool.len(),
                        admitted = admitted,
                        "No source produced a candidate, abandoning cycle"
                    );
                    return admitted;
                },
            };

            // Room was checked before the signature was recorded, and only
            // this cycle pushes, so a rejected push means a logic error.
            if !self.pool.push(item) {
                tracing::error!(category = %category, "Admitted item did not fit the pool");
                break;
            }
            admitted += 1;
        }

        metrics::counter!(
            "replenish_cycles_total",
            "category" => category.clone(),
            "outcome" => "completed"
        )
        .increment(1);
        tracing::debug!(
            category = %category,
            occupancy = self.pool.len(),
            admitted = admitted,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Replenishment cycle finished"
        );
        admitted
    }

    /// Produces one admitted candidate.
    ///
    /// A source that cannot serve a pass is skipped for that pass until the
    /// cycle ends; one that burns its attempts is skipped for both.
    async fn next_candidate(
        &self,
        skipped: &mut [[bool; 2]],
        shutdown: &watch::Receiver<bool>,
    ) -> Next {
        for (pass, strict) in [true, false].into_iter().enumerate() {
            for (index, source) in self.sources.iter().enumerate() {
                if skipped[index][pass] || (!strict && source.adapts_difficulty()) {
                    continue;
                }
                match self.try_source(source, strict, shutdown).await {
                    Attempts::Admitted(item) => return Next::Item(item),
                    Attempts::Stopped => return Next::Stop,
                    Attempts::Exhausted => skipped[index] = [true, true],
                    Attempts::Unavailable => skipped[index][pass] = true,
                }
            }
        }
        Next::Abandon
    }

    /// Spends up to `max_attempts` calls on one source.
    ///
    /// Shutdown is honoured before every attempt and while a call is
    /// pending; the pending call is left to finish on its blocking thread.
    async fn try_source(
        &self,
        source: &Arc<dyn ContentSource>,
        strict: bool,
        shutdown: &watch::Receiver<bool>,
    ) -> Attempts {
        let mut stop = shutdown.clone();
        for attempt in 1..=source.max_attempts().max(1) {
            if *stop.borrow() {
                return Attempts::Stopped;
            }
            let request = SourceRequest::new(
                self.pool.name(),
                self.pool.next_topic(),
                self.current_level(),
            )
            .with_strict_difficulty(strict)
            .with_avoid(self.pool.avoid_list());

            // A dropped sender also means the engine is gone.
            let fetched = tokio::select! {
                biased;
                _ = stop.wait_for(|stopping| *stopping) => return Attempts::Stopped,
                fetched = Self::fetch(source, request) => fetched,
            };
            let result = match fetched {
                Ok(item) => self.admit(item).await,
                Err(e) => Err(e),
            };
            let outcome = match &result {
                Ok(_) => "admitted",
                Err(Error::DuplicateRejected { .. }) => "duplicate",
                Err(Error::SourceTimeout { .. }) => "timeout",
                Err(Error::MalformedResponse { .. }) => "malformed",
                Err(_) => "unavailable",
            };
            metrics::counter!(
                "generation_requests_total",
                "source" => source.name().to_string(),
                "outcome" => outcome
            )
            .increment(1);

            match result {
                Ok(item) => return Attempts::Admitted(item),
                Err(e) if e.is_retryable() => {
                    tracing::debug!(
                        category = self.pool.name(),
                        source = source.name(),
                        attempt = attempt,
                        strict = strict,
                        error = %e,
                        "Candidate rejected, retrying"
                    );
                },
                Err(e) => {
                    tracing::debug!(
                        category = self.pool.name(),
                        source = source.name(),
                        strict = strict,
                        error = %e,
                        "Source cannot serve request"
                    );
                    return Attempts::Unavailable;
                },
            }
        }

        tracing::info!(
            category = self.pool.name(),
            source = source.name(),
            attempts = source.max_attempts(),
            "Source exhausted its attempts for this cycle"
        );
        Attempts::Exhausted
    }

    /// Calls a source on the blocking pool, bounded by its timeout.
    ///
    /// A call that overruns keeps running on its blocking thread; only its
    /// result is discarded.
    async fn fetch(
        source: &Arc<dyn ContentSource>,
        request: SourceRequest,
    ) -> Result<ContentItem> {
        let timeout = source.timeout();
        let worker = Arc::clone(source);
        let call = tokio::task::spawn_blocking(move || worker.fetch(&request));

        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(Error::OperationFailed {
                operation: format!("{}_fetch", source.name()),
                cause: join_error.to_string(),
            }),
            Err(_) => Err(Error::SourceTimeout {
                source_name: source.name().to_string(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Runs a candidate through deduplication.
    ///
    /// The signature is only recorded when the pool has room for the item.
    /// The check runs on the blocking pool because recording may write the
    /// fingerprint store to disk.
    async fn admit(&self, item: ContentItem) -> Result<ContentItem> {
        if self.pool.len() >= self.pool.capacity() {
            return Err(Error::OperationFailed {
                operation: "admit".to_string(),
                cause: format!("pool '{}' is full", self.pool.name()),
            });
        }

        let dedup = Arc::clone(&self.dedup);
        let (item, signature, check) = tokio::task::spawn_blocking(move || {
            let signature = dedup.fingerprint(&item);
            let check = dedup.check_and_record(signature);
            (item, signature, check)
        })
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "dedup_check".to_string(),
            cause: e.to_string(),
        })?;

        if check.is_duplicate {
            self.pool.stats().record_rejected_duplicate();
            return Err(Error::DuplicateRejected {
                signature: signature.to_hex(),
            });
        }
        self.pool.stats().record_admitted();
        Ok(item)
    }

    fn current_level(&self) -> DifficultyLevel {
        self.controller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current_level()
    }
}

/// Outcome of walking the source list for one candidate.
enum Next {
    Item(ContentItem),
    Abandon,
    Stop,
}

/// Result of spending one source's attempt budget.
enum Attempts {
    Admitted(ContentItem),
    Exhausted,
    Unavailable,
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategorySpec;
    use crate::models::Provenance;
    use crate::services::deduplication::DeduplicationConfig;
    use crate::services::difficulty::DifficultyConfig;
    use crate::storage::{FingerprintStore, MemoryFingerprintStore};
    use std::sync::atomic::{AtomicU32, Ordering};
    use sha2::{Digest, Sha256};
    use std::time::Duration;

    /// Returns a fresh numbered item per call.
    struct Counter {
        calls: AtomicU32,
        adapts: bool,
    }

    impl ContentSource for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn fetch(&self, request: &SourceRequest) -> Result<ContentItem> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ContentItem::new(
                request.category.clone(),
                request.topic.clone(),
                distinct_body(n),
                "x",
                request.difficulty,
                Provenance::Local,
            ))
        }

        fn adapts_difficulty(&self) -> bool {
            self.adapts
        }
    }

    /// Sixteen unrelated hex words, so bodies never land near each other.
    fn distinct_body(n: u32) -> String {
        let digest = hex::encode(Sha256::digest(n.to_le_bytes()));
        digest
            .as_bytes()
            .chunks(4)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Always returns the same item.
    struct Repeater {
        calls: AtomicU32,
    }

    impl ContentSource for Repeater {
        fn name(&self) -> &str {
            "repeater"
        }

        fn fetch(&self, request: &SourceRequest) -> Result<ContentItem> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ContentItem::new(
                request.category.clone(),
                "fixed",
                "The same question every time",
                "x",
                DifficultyLevel::Basic,
                Provenance::Local,
            ))
        }

        fn max_attempts(&self) -> u32 {
            3
        }
    }

    /// Only serves relaxed requests.
    #[derive(Default)]
    struct Picky {
        calls: AtomicU32,
    }

    impl ContentSource for Picky {
        fn name(&self) -> &str {
            "picky"
        }

        fn fetch(&self, request: &SourceRequest) -> Result<ContentItem> {
            if request.strict_difficulty {
                return Err(Error::SourceUnavailable {
                    source_name: "picky".to_string(),
                    cause: "no rows at level".to_string(),
                });
            }
            Ok(ContentItem::new(
                request.category.clone(),
                request.topic.clone(),
                distinct_body(1_000 + self.calls.fetch_add(1, Ordering::SeqCst)),
                "x",
                DifficultyLevel::Entry,
                Provenance::Local,
            ))
        }
    }

    /// Never answers in time.
    struct Sleeper {
        calls: Arc<AtomicU32>,
    }

    impl ContentSource for Sleeper {
        fn name(&self) -> &str {
            "sleeper"
        }

        fn fetch(&self, _request: &SourceRequest) -> Result<ContentItem> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(60));
            Err(Error::SourceUnavailable {
                source_name: "sleeper".to_string(),
                cause: "late".to_string(),
            })
        }

        fn max_attempts(&self) -> u32 {
            2
        }

        fn timeout(&self) -> Duration {
            Duration::from_millis(10)
        }

        fn adapts_difficulty(&self) -> bool {
            true
        }
    }

    /// Always unreachable, but claims it could adapt.
    #[derive(Default)]
    struct Down {
        calls: AtomicU32,
    }

    impl ContentSource for Down {
        fn name(&self) -> &str {
            "down"
        }

        fn fetch(&self, _request: &SourceRequest) -> Result<ContentItem> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::SourceUnavailable {
                source_name: "down".to_string(),
                cause: "connection refused".to_string(),
            })
        }

        fn adapts_difficulty(&self) -> bool {
            true
        }
    }

    /// Takes far longer than its timeout on every attempt.
    struct Stalled {
        calls: Arc<AtomicU32>,
    }

    impl ContentSource for Stalled {
        fn name(&self) -> &str {
            "stalled"
        }

        fn fetch(&self, _request: &SourceRequest) -> Result<ContentItem> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(500));
            Err(Error::SourceUnavailable {
                source_name: "stalled".to_string(),
                cause: "late".to_string(),
            })
        }

        fn max_attempts(&self) -> u32 {
            5
        }

        fn timeout(&self) -> Duration {
            Duration::from_millis(200)
        }

        fn adapts_difficulty(&self) -> bool {
            true
        }
    }

    /// Memory store that notes which thread wrote to it.
    #[derive(Default)]
    struct ThreadNotingStore {
        inner: MemoryFingerprintStore,
        writers: Mutex<Vec<std::thread::ThreadId>>,
    }

    impl FingerprintStore for ThreadNotingStore {
        fn load(&self) -> Result<Vec<crate::models::Signature>> {
            self.inner.load()
        }

        fn insert(&self, signature: crate::models::Signature) -> Result<bool> {
            self.writers
                .lock()
                .unwrap()
                .push(std::thread::current().id());
            self.inner.insert(signature)
        }

        fn clear(&self) -> Result<()> {
            self.inner.clear()
        }

        fn capacity(&self) -> usize {
            self.inner.capacity()
        }
    }

    fn replenisher(sources: Vec<Arc<dyn ContentSource>>, capacity: usize) -> Replenisher {
        replenisher_with_store(sources, capacity, Arc::new(MemoryFingerprintStore::new()))
    }

    fn replenisher_with_store(
        sources: Vec<Arc<dyn ContentSource>>,
        capacity: usize,
        store: Arc<dyn FingerprintStore>,
    ) -> Replenisher {
        let settings = PoolSettings::default().with_bounds(capacity, 1);
        let pool = Arc::new(CategoryPool::new(
            CategorySpec::new("science").with_topics(["space", "cells"]),
            &settings,
        ));
        let controller = Arc::new(Mutex::new(DifficultyController::new(
            DifficultyConfig::default(),
        )));
        let dedup = Arc::new(DeduplicationService::new(DeduplicationConfig::default(), store));
        Replenisher::new(pool, controller, sources.into(), dedup, settings)
    }

    #[tokio::test]
    async fn test_cycle_fills_to_capacity() {
        let source = Arc::new(Counter {
            calls: AtomicU32::new(0),
            adapts: true,
        });
        let replenisher = replenisher(vec![source as Arc<dyn ContentSource>], 4);
        let (_tx, rx) = watch::channel(false);

        assert_eq!(replenisher.run_cycle(&rx).await, 4);
        assert_eq!(replenisher.pool.len(), 4);
        assert_eq!(replenisher.run_cycle(&rx).await, 0);

        let stats = replenisher.pool.stats().snapshot();
        assert_eq!(stats.cycles_started, 1);
        assert_eq!(stats.admitted, 4);
        assert!(!replenisher.pool.is_replenishing());
    }

    #[tokio::test]
    async fn test_duplicates_exhaust_source_and_abandon() {
        let source = Arc::new(Repeater {
            calls: AtomicU32::new(0),
        });
        let replenisher = replenisher(vec![source.clone() as Arc<dyn ContentSource>], 3);
        let (_tx, rx) = watch::channel(false);

        assert_eq!(replenisher.run_cycle(&rx).await, 1);
        let stats = replenisher.pool.stats().snapshot();
        assert_eq!(stats.admitted, 1);
        assert_eq!(stats.rejected_duplicates, 3);
        assert_eq!(stats.cycles_abandoned, 1);
        // One admitted call plus three rejected attempts.
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_relaxed_pass_after_timeouts() {
        let sleeper_calls = Arc::new(AtomicU32::new(0));
        let sources: Vec<Arc<dyn ContentSource>> = vec![
            Arc::new(Picky::default()),
            Arc::new(Sleeper {
                calls: Arc::clone(&sleeper_calls),
            }),
        ];
        let replenisher = replenisher(sources, 3);
        let (_tx, rx) = watch::channel(false);

        assert_eq!(replenisher.run_cycle(&rx).await, 3);
        tokio::time::sleep(Duration::from_millis(100)).await;
        // The sleeper burns its two attempts once, then is skipped.
        assert_eq!(sleeper_calls.load(Ordering::SeqCst), 2);
        let item = replenisher.pool.dequeue().unwrap();
        assert_eq!(item.difficulty, DifficultyLevel::Entry);
    }

    #[tokio::test]
    async fn test_adaptive_source_not_used_in_relaxed_pass() {
        let sources: Vec<Arc<dyn ContentSource>> = vec![Arc::new(Sleeper {
            calls: Arc::new(AtomicU32::new(0)),
        })];
        let replenisher = replenisher(sources, 2);
        let (_tx, rx) = watch::channel(false);

        assert_eq!(replenisher.run_cycle(&rx).await, 0);
        assert_eq!(replenisher.pool.stats().snapshot().cycles_abandoned, 1);
    }

    #[tokio::test]
    async fn test_requests_carry_avoid_list_and_level() {
        let source = Arc::new(Counter {
            calls: AtomicU32::new(0),
            adapts: false,
        });
        let replenisher = replenisher(vec![source as Arc<dyn ContentSource>], 2);
        let (_tx, rx) = watch::channel(false);
        replenisher.run_cycle(&rx).await;

        let first = replenisher.pool.dequeue().unwrap();
        let second = replenisher.pool.dequeue().unwrap();
        assert_eq!(first.difficulty, DifficultyLevel::Intermediate);
        assert_eq!(first.topic, "space");
        assert_eq!(second.topic, "cells");
        assert_eq!(replenisher.pool.avoid_list().len(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_stops_run_loop() {
        let source = Arc::new(Counter {
            calls: AtomicU32::new(0),
            adapts: true,
        });
        let replenisher = replenisher(vec![source as Arc<dyn ContentSource>], 2);
        let pool = Arc::clone(&replenisher.pool);
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(replenisher.run(rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.len(), 2);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_unavailable_source_skipped_for_rest_of_pass() {
        let down = Arc::new(Down::default());
        let sources: Vec<Arc<dyn ContentSource>> = vec![
            down.clone(),
            Arc::new(Counter {
                calls: AtomicU32::new(0),
                adapts: true,
            }),
        ];
        let replenisher = replenisher(sources, 10);
        let (_tx, rx) = watch::channel(false);

        assert_eq!(replenisher.run_cycle(&rx).await, 10);
        assert_eq!(down.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_strict_miss_still_reaches_relaxed_pass() {
        let picky = Arc::new(Picky::default());
        let replenisher = replenisher(vec![picky.clone() as Arc<dyn ContentSource>], 3);
        let (_tx, rx) = watch::channel(false);

        assert_eq!(replenisher.run_cycle(&rx).await, 3);
        assert_eq!(picky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let sources: Vec<Arc<dyn ContentSource>> = vec![Arc::new(Stalled {
            calls: Arc::clone(&calls),
        })];
        let replenisher = replenisher(sources, 3);
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(replenisher.run(rx));
        tokio::time::sleep(Duration::from_millis(20)).await;
        let requested = Instant::now();
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();

        assert!(requested.elapsed() < Duration::from_millis(150));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_before_attempt_skips_source() {
        let calls = Arc::new(AtomicU32::new(0));
        let replenisher = replenisher(
            vec![Arc::new(Stalled {
                calls: Arc::clone(&calls),
            }) as Arc<dyn ContentSource>],
            3,
        );
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        assert_eq!(replenisher.run_cycle(&rx).await, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(replenisher.pool.stats().snapshot().cycles_abandoned, 0);
        assert!(!replenisher.pool.is_replenishing());
    }

    #[tokio::test]
    async fn test_store_written_off_the_async_thread() {
        let store = Arc::new(ThreadNotingStore::default());
        let replenisher = replenisher_with_store(
            vec![Arc::new(Counter {
                calls: AtomicU32::new(0),
                adapts: true,
            }) as Arc<dyn ContentSource>],
            2,
            store.clone(),
        );
        let (_tx, rx) = watch::channel(false);

        assert_eq!(replenisher.run_cycle(&rx).await, 2);
        let writers = store.writers.lock().unwrap();
        assert_eq!(writers.len(), 2);
        let runtime_thread = std::thread::current().id();
        assert!(writers.iter().all(|id| *id != runtime_thread));
    }

    #[tokio::test]
    async fn test_full_pool_records_nothing() {
        let replenisher = replenisher(Vec::new(), 1);
        let item = |n| {
            ContentItem::new(
                "science",
                "space",
                distinct_body(n),
                "x",
                DifficultyLevel::Basic,
                Provenance::Local,
            )
        };
        assert!(replenisher.pool.push(item(1)));

        let err = replenisher.admit(item(2)).await.unwrap_err();
        assert!(matches!(err, Error::OperationFailed { .. }));
        assert_eq!(replenisher.dedup.session_len(), 0);
        assert_eq!(replenisher.pool.stats().snapshot().admitted, 0);
    }
}
