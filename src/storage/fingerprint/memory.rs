//! In-memory fingerprint store.

use super::{DEFAULT_STORE_CAPACITY, FingerprintStore, admit};
use crate::Result;
use crate::models::Signature;
use std::sync::Mutex;

/// Fingerprint store that lives only as long as the process.
#[derive(Debug)]
pub struct MemoryFingerprintStore {
    capacity: usize,
    signatures: Mutex<Vec<Signature>>,
}

impl MemoryFingerprintStore {
    /// Creates an empty store with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_STORE_CAPACITY)
    }

    /// Creates an empty store with a custom capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            signatures: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Signature>> {
        self.signatures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for MemoryFingerprintStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FingerprintStore for MemoryFingerprintStore {
    fn load(&self) -> Result<Vec<Signature>> {
        Ok(self.lock().clone())
    }

    fn insert(&self, signature: Signature) -> Result<bool> {
        Ok(admit(&mut self.lock(), signature, self.capacity))
    }

    fn clear(&self) -> Result<()> {
        self.lock().clear();
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> Result<usize> {
        Ok(self.lock().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_cap_keeps_newest() {
        let store = MemoryFingerprintStore::with_capacity(300);
        for i in 0..300 {
            store.insert(Signature::new(i)).unwrap();
        }
        assert_eq!(store.len().unwrap(), 300);

        let newest = Signature::new(u64::MAX);
        store.insert(newest).unwrap();

        let all = store.load().unwrap();
        assert!(all.len() <= 300);
        assert_eq!(all.last(), Some(&newest));
        assert!(!all.contains(&Signature::new(0)));
    }

    #[test]
    fn test_find_near() {
        let store = MemoryFingerprintStore::new();
        store.insert(Signature::new(0b1000)).unwrap();
        assert_eq!(
            store.find_near(Signature::new(0b1001), 2).unwrap(),
            Some((Signature::new(0b1000), 1))
        );
        assert_eq!(store.find_near(Signature::new(0b0111), 2).unwrap(), None);
    }
}
