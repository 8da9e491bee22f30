//! Persisted fingerprint history.
//!
//! Signatures are kept in insertion order. Once the store holds `capacity`
//! entries, the oldest half is dropped before the next insert, so the
//! store never grows past its cap and the newest signatures always
//! survive a trim.

mod filesystem;
mod memory;

pub use filesystem::FilesystemFingerprintStore;
pub use memory::MemoryFingerprintStore;

use crate::Result;
use crate::models::Signature;

/// Default maximum number of persisted signatures.
pub const DEFAULT_STORE_CAPACITY: usize = 300;

/// Trait for fingerprint store backends.
///
/// Implementations serialize access internally, so one store can be
/// shared by every category pool behind an `Arc`.
pub trait FingerprintStore: Send + Sync {
    /// Returns all persisted signatures, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoreCorruption` if the backing data cannot be decoded.
    fn load(&self) -> Result<Vec<Signature>>;

    /// Appends a signature, trimming the oldest half first if at capacity.
    ///
    /// Returns `false` if the exact signature was already present.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn insert(&self, signature: Signature) -> Result<bool>;

    /// Removes every signature.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn clear(&self) -> Result<()>;

    /// Maximum number of signatures kept.
    fn capacity(&self) -> usize;

    /// Returns the number of persisted signatures.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`FingerprintStore::load`].
    fn len(&self) -> Result<usize> {
        Ok(self.load()?.len())
    }

    /// Returns true if nothing is persisted.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`FingerprintStore::load`].
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns the closest persisted signature within `threshold` bits.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`FingerprintStore::load`].
    fn find_near(&self, signature: Signature, threshold: u32) -> Result<Option<(Signature, u32)>> {
        Ok(nearest(self.load()?.iter().copied(), signature, threshold))
    }
}

/// Applies the insert-with-trim rule to an in-memory signature list.
///
/// Returns `false` (and leaves the list untouched) for an exact duplicate.
pub(crate) fn admit(signatures: &mut Vec<Signature>, signature: Signature, capacity: usize) -> bool {
    if signatures.contains(&signature) {
        return false;
    }
    let capacity = capacity.max(1);
    if signatures.len() >= capacity {
        let drop = (signatures.len() / 2).max(signatures.len() + 1 - capacity);
        signatures.drain(..drop);
        tracing::debug!(dropped = drop, remaining = signatures.len(), "Trimmed fingerprint store");
        metrics::counter!("fingerprint_store_trims_total").increment(1);
    }
    signatures.push(signature);
    true
}

/// Finds the nearest signature within `threshold`, if any.
pub(crate) fn nearest(
    candidates: impl IntoIterator<Item = Signature>,
    signature: Signature,
    threshold: u32,
) -> Option<(Signature, u32)> {
    candidates
        .into_iter()
        .map(|s| (s, s.hamming_distance(signature)))
        .filter(|(_, d)| *d <= threshold)
        .min_by_key(|(_, d)| *d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_skips_exact_duplicates() {
        let mut list = vec![Signature::new(1), Signature::new(2)];
        assert!(!admit(&mut list, Signature::new(2), 10));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_admit_trims_oldest_half_at_capacity() {
        let mut list: Vec<Signature> = (0..300).map(Signature::new).collect();
        assert!(admit(&mut list, Signature::new(10_000), 300));

        assert_eq!(list.len(), 151);
        assert_eq!(list.first(), Some(&Signature::new(150)));
        assert_eq!(list.last(), Some(&Signature::new(10_000)));
    }

    #[test]
    fn test_admit_capacity_one() {
        let mut list = Vec::new();
        assert!(admit(&mut list, Signature::new(1), 1));
        assert!(admit(&mut list, Signature::new(2), 1));
        assert_eq!(list, vec![Signature::new(2)]);
    }

    #[test]
    fn test_nearest_prefers_smallest_distance() {
        let target = Signature::new(0b1111);
        let found = nearest(
            [Signature::new(0b0011), Signature::new(0b0111), Signature::new(0)],
            target,
            2,
        );
        assert_eq!(found, Some((Signature::new(0b0111), 1)));
        assert_eq!(nearest([Signature::new(0)], target, 2), None);
    }
}
