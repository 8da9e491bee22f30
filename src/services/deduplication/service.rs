//! Deduplication service.
//!
//! Checks a candidate signature against two histories, in order:
//! 1. **Session**: every signature admitted by this process
//! 2. **Persisted**: the fingerprint store shared across restarts
//!
//! A store that cannot be read fails open: only the session history
//! applies until the store recovers.

use crate::models::{ContentItem, Signature};
use crate::storage::FingerprintStore;
use crate::storage::fingerprint::nearest;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::instrument;

use super::config::DeduplicationConfig;
use super::simhash::Fingerprinter;
use super::types::{DuplicateCheckResult, DuplicateReason};

/// Service for near-duplicate detection.
///
/// # Example
///
/// ```rust
/// use quizpool::{ContentItem, DifficultyLevel, MemoryFingerprintStore, Provenance};
/// use quizpool::services::deduplication::{DeduplicationConfig, DeduplicationService};
/// use std::sync::Arc;
///
/// let service = DeduplicationService::new(
///     DeduplicationConfig::default(),
///     Arc::new(MemoryFingerprintStore::new()),
/// );
/// let item = ContentItem::new(
///     "science", "space", "Which planet is largest?", "Jupiter",
///     DifficultyLevel::Basic, Provenance::Local,
/// );
/// let sig = service.fingerprint(&item);
/// assert!(!service.is_duplicate(sig));
/// service.record(sig);
/// assert!(service.is_duplicate(sig));
/// ```
pub struct DeduplicationService {
    /// Configuration.
    config: DeduplicationConfig,
    /// SimHash settings derived from the config.
    fingerprinter: Fingerprinter,
    /// Signatures admitted this session.
    session: RwLock<Vec<Signature>>,
    /// Persisted history.
    store: Arc<dyn FingerprintStore>,
}

impl DeduplicationService {
    /// Creates a new deduplication service.
    #[must_use]
    pub fn new(config: DeduplicationConfig, store: Arc<dyn FingerprintStore>) -> Self {
        let fingerprinter = Fingerprinter::from_config(&config);
        Self {
            config,
            fingerprinter,
            session: RwLock::new(Vec::new()),
            store,
        }
    }

    /// Computes an item's signature.
    #[must_use]
    pub fn fingerprint(&self, item: &ContentItem) -> Signature {
        self.fingerprinter.fingerprint(item)
    }

    /// Returns the fingerprinter in use.
    #[must_use]
    pub const fn fingerprinter(&self) -> &Fingerprinter {
        &self.fingerprinter
    }

    /// Checks a signature against session and persisted history.
    #[instrument(
        skip(self),
        fields(operation = "dedup_check", signature = %signature)
    )]
    pub fn check(&self, signature: Signature) -> DuplicateCheckResult {
        let start = Instant::now();

        if !self.config.enabled {
            tracing::debug!("Deduplication disabled, skipping check");
            return DuplicateCheckResult::not_duplicate(elapsed_ms(start));
        }

        let session = self
            .session
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let result = self.check_locked(&session, signature, start);
        drop(session);
        result
    }

    /// Returns true if the signature is within the threshold of any
    /// recorded signature.
    #[must_use]
    pub fn is_duplicate(&self, signature: Signature) -> bool {
        self.check(signature).is_duplicate
    }

    /// Records an admitted signature in the session and persisted history.
    ///
    /// Store write failures are logged; the session record always succeeds.
    #[instrument(skip(self), fields(operation = "dedup_record", signature = %signature))]
    pub fn record(&self, signature: Signature) {
        let mut session = self
            .session
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.record_locked(&mut session, signature);
    }

    /// Checks and, if unique, records a signature under a single lock.
    ///
    /// Concurrent replenishers use this so two near-identical candidates
    /// cannot both pass the check before either is recorded.
    pub fn check_and_record(&self, signature: Signature) -> DuplicateCheckResult {
        let start = Instant::now();
        let mut session = self
            .session
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let result = if self.config.enabled {
            self.check_locked(&session, signature, start)
        } else {
            DuplicateCheckResult::not_duplicate(elapsed_ms(start))
        };
        if !result.is_duplicate {
            self.record_locked(&mut session, signature);
        }
        drop(session);
        result
    }

    /// Number of signatures recorded this session.
    #[must_use]
    pub fn session_len(&self) -> usize {
        self.session
            .read()
            .map_or_else(|poisoned| poisoned.into_inner().len(), |s| s.len())
    }

    /// Returns the persisted store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn FingerprintStore> {
        &self.store
    }

    /// Returns true if deduplication is enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Returns the configured Hamming threshold.
    #[must_use]
    pub const fn threshold(&self) -> u32 {
        self.config.threshold
    }

    fn check_locked(
        &self,
        session: &[Signature],
        signature: Signature,
        start: Instant,
    ) -> DuplicateCheckResult {
        let threshold = self.config.threshold;

        if let Some((matched, distance)) = nearest(session.iter().copied(), signature, threshold) {
            return duplicate(DuplicateReason::Session, matched, distance, start);
        }

        match self.store.find_near(signature, threshold) {
            Ok(Some((matched, distance))) => {
                return duplicate(DuplicateReason::Persisted, matched, distance, start);
            },
            Ok(None) => {},
            Err(e) => {
                tracing::warn!(error = %e, "Fingerprint store unreadable, skipping persisted check");
                metrics::counter!("dedup_store_failures_total").increment(1);
            },
        }

        let duration_ms = elapsed_ms(start);
        metrics::counter!("dedup_checks_total", "result" => "unique").increment(1);
        DuplicateCheckResult::not_duplicate(duration_ms)
    }

    fn record_locked(&self, session: &mut Vec<Signature>, signature: Signature) {
        if !session.contains(&signature) {
            session.push(signature);
        }
        if let Err(e) = self.store.insert(signature) {
            tracing::warn!(error = %e, "Failed to persist signature");
            metrics::counter!("dedup_store_failures_total").increment(1);
        }
    }
}

#[allow(clippy::cast_possible_truncation)] // Duration in ms won't exceed u64::MAX
fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn duplicate(
    reason: DuplicateReason,
    matched: Signature,
    distance: u32,
    start: Instant,
) -> DuplicateCheckResult {
    let duration_ms = elapsed_ms(start);
    tracing::info!(
        reason = reason.as_str(),
        matched = %matched,
        distance = distance,
        duration_ms = duration_ms,
        "Near-duplicate found"
    );
    metrics::counter!("dedup_duplicates_total", "reason" => reason.as_str()).increment(1);
    metrics::counter!("dedup_checks_total", "result" => "duplicate").increment(1);
    DuplicateCheckResult::duplicate(reason, matched, distance, duration_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DifficultyLevel, Provenance};
    use crate::storage::{FilesystemFingerprintStore, MemoryFingerprintStore};

    fn service(config: DeduplicationConfig) -> DeduplicationService {
        DeduplicationService::new(config, Arc::new(MemoryFingerprintStore::new()))
    }

    fn item(id: &str, body: &str) -> ContentItem {
        ContentItem::new(
            "geography",
            "rivers",
            body,
            "Nile",
            DifficultyLevel::Intermediate,
            Provenance::Generative,
        )
        .with_id(id)
    }

    #[test]
    fn test_identical_body_different_id_is_duplicate() {
        let service = service(DeduplicationConfig::default());
        let first = item("a", "Which river is the longest in Africa?");
        let second = item("b", "Which river is the longest in Africa?");

        let sig = service.fingerprint(&first);
        assert!(!service.check_and_record(sig).is_duplicate);

        let result = service.check(service.fingerprint(&second));
        assert!(result.is_duplicate);
        assert_eq!(result.reason, Some(DuplicateReason::Session));
        assert_eq!(result.distance, Some(0));
    }

    #[test]
    fn test_threshold_boundary() {
        let service = service(DeduplicationConfig::default());
        service.record(Signature::new(0));

        assert!(service.is_duplicate(Signature::new(0b11)));
        assert!(!service.is_duplicate(Signature::new(0b111)));
    }

    #[test]
    fn test_persisted_history_matches_after_restart() {
        let store: Arc<dyn FingerprintStore> = Arc::new(MemoryFingerprintStore::new());
        let first = DeduplicationService::new(DeduplicationConfig::default(), Arc::clone(&store));
        first.record(Signature::new(0xabcd));

        let second = DeduplicationService::new(DeduplicationConfig::default(), store);
        assert_eq!(second.session_len(), 0);
        let result = second.check(Signature::new(0xabcf));
        assert_eq!(result.reason, Some(DuplicateReason::Persisted));
    }

    #[test]
    fn test_disabled_never_reports_duplicates() {
        let service = service(DeduplicationConfig::default().with_enabled(false));
        service.record(Signature::new(5));
        assert!(!service.is_duplicate(Signature::new(5)));
        assert!(!service.check_and_record(Signature::new(5)).is_duplicate);
    }

    #[test]
    fn test_corrupt_store_fails_open_but_session_applies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fingerprints.json");
        std::fs::write(&path, "garbage").unwrap();

        let service = DeduplicationService::new(
            DeduplicationConfig::default(),
            Arc::new(FilesystemFingerprintStore::new(&path)),
        );
        assert!(!service.is_duplicate(Signature::new(42)));

        service.record(Signature::new(42));
        assert!(service.is_duplicate(Signature::new(42)));
    }

    #[test]
    fn test_check_and_record_rejects_second_near_copy() {
        let service = service(DeduplicationConfig::default());
        assert!(!service.check_and_record(Signature::new(0b1000)).is_duplicate);
        assert!(service.check_and_record(Signature::new(0b1001)).is_duplicate);
        assert_eq!(service.session_len(), 1);
    }
}
