//! Per-category bounded pool.
//!
//! The pool is a FIFO of ready items plus the bookkeeping the replenisher
//! needs: a single-flight flag, a wake-up signal, the topic rotation cursor
//! and the avoid list of recently admitted summaries.

use crate::config::{CategorySpec, PoolSettings};
use crate::models::ContentItem;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Live counters for one pool.
#[derive(Debug, Default)]
pub struct PoolStats {
    served: AtomicU64,
    signals: AtomicU64,
    cycles_started: AtomicU64,
    cycles_abandoned: AtomicU64,
    admitted: AtomicU64,
    rejected_duplicates: AtomicU64,
}

impl PoolStats {
    pub(crate) fn record_served(&self) {
        self.served.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_signal(&self) {
        self.signals.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cycle_started(&self) {
        self.cycles_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cycle_abandoned(&self) {
        self.cycles_abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected_duplicate(&self) {
        self.rejected_duplicates.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            served: self.served.load(Ordering::Relaxed),
            signals: self.signals.load(Ordering::Relaxed),
            cycles_started: self.cycles_started.load(Ordering::Relaxed),
            cycles_abandoned: self.cycles_abandoned.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected_duplicates: self.rejected_duplicates.load(Ordering::Relaxed),
        }
    }
}

/// Copy of [`PoolStats`] at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PoolStatsSnapshot {
    /// Items handed out by `get_item`.
    pub served: u64,
    /// Low-water signals sent to the replenisher.
    pub signals: u64,
    /// Replenishment cycles begun.
    pub cycles_started: u64,
    /// Cycles that ended without filling the pool.
    pub cycles_abandoned: u64,
    /// Candidates admitted into the pool.
    pub admitted: u64,
    /// Candidates rejected as near-duplicates.
    pub rejected_duplicates: u64,
}

/// Bounded FIFO of ready items for one category.
pub struct CategoryPool {
    spec: CategorySpec,
    capacity: usize,
    low_water_mark: usize,
    avoid_list_len: usize,
    items: Mutex<VecDeque<ContentItem>>,
    recent: Mutex<VecDeque<String>>,
    replenishing: AtomicBool,
    wake: Notify,
    topic_cursor: AtomicUsize,
    stats: PoolStats,
}

impl CategoryPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new(spec: CategorySpec, settings: &PoolSettings) -> Self {
        Self {
            spec,
            capacity: settings.capacity,
            low_water_mark: settings.low_water_mark,
            avoid_list_len: settings.avoid_list_len,
            items: Mutex::new(VecDeque::with_capacity(settings.capacity)),
            recent: Mutex::new(VecDeque::with_capacity(settings.avoid_list_len)),
            replenishing: AtomicBool::new(false),
            wake: Notify::new(),
            topic_cursor: AtomicUsize::new(0),
            stats: PoolStats::default(),
        }
    }

    /// Category name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Category definition.
    #[must_use]
    pub const fn spec(&self) -> &CategorySpec {
        &self.spec
    }

    /// Maximum occupancy.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Occupancy below which a dequeue signals the replenisher.
    #[must_use]
    pub const fn low_water_mark(&self) -> usize {
        self.low_water_mark
    }

    /// Current occupancy.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items().len()
    }

    /// Returns true if no items are ready.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live counters.
    #[must_use]
    pub const fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// Removes the oldest item.
    ///
    /// When the remaining occupancy drops below the low-water mark and no
    /// replenishment is in flight, the replenisher is woken.
    pub fn dequeue(&self) -> Option<ContentItem> {
        let mut items = self.items();
        let item = items.pop_front();
        let remaining = items.len();
        drop(items);

        if item.is_some() {
            self.stats.record_served();
            metrics::counter!("pool_items_served_total", "category" => self.spec.name.clone())
                .increment(1);
            self.record_occupancy(remaining);
        }
        if remaining < self.low_water_mark {
            self.signal();
        }
        item
    }

    /// Wakes the replenisher unless a cycle is already in flight.
    ///
    /// `Notify` keeps at most one permit, so repeated signals before the
    /// replenisher wakes collapse into one.
    pub fn signal(&self) {
        if self.replenishing.load(Ordering::Acquire) {
            return;
        }
        self.stats.record_signal();
        self.wake.notify_one();
    }

    /// Waits for a low-water signal.
    pub async fn notified(&self) {
        self.wake.notified().await;
    }

    /// Appends an admitted item.
    ///
    /// Returns false, leaving the pool unchanged, when the pool is full.
    pub fn push(&self, item: ContentItem) -> bool {
        let summary = item.summary();
        let mut items = self.items();
        if items.len() >= self.capacity {
            return false;
        }
        items.push_back(item);
        let occupancy = items.len();
        drop(items);

        if self.avoid_list_len > 0 {
            let mut recent = self.recent();
            if recent.len() >= self.avoid_list_len {
                recent.pop_front();
            }
            recent.push_back(summary);
        }
        self.record_occupancy(occupancy);
        true
    }

    /// Summaries of recently admitted items, oldest first.
    #[must_use]
    pub fn avoid_list(&self) -> Vec<String> {
        self.recent().iter().cloned().collect()
    }

    /// Next topic in the category's rotation.
    pub fn next_topic(&self) -> String {
        let cursor = self.topic_cursor.fetch_add(1, Ordering::Relaxed);
        self.spec.topic_at(cursor).to_string()
    }

    /// Returns true while a replenishment cycle holds the guard.
    #[must_use]
    pub fn is_replenishing(&self) -> bool {
        self.replenishing.load(Ordering::Acquire)
    }

    /// Claims the single-flight flag.
    ///
    /// Returns `None` if another cycle is in flight. The flag is released
    /// when the guard drops.
    pub fn try_begin_replenish(&self) -> Option<ReplenishGuard<'_>> {
        self.replenishing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ReplenishGuard { pool: self })
    }

    fn record_occupancy(&self, occupancy: usize) {
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!("pool_occupancy", "category" => self.spec.name.clone())
            .set(occupancy as f64);
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<ContentItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn recent(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.recent.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds a pool's single-flight flag for the duration of one cycle.
pub struct ReplenishGuard<'a> {
    pool: &'a CategoryPool,
}

impl Drop for ReplenishGuard<'_> {
    fn drop(&mut self) {
        self.pool.replenishing.store(false, Ordering::Release);
    }
}
