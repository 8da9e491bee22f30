//! JSON file fingerprint store.
//!
//! Layout:
//!
//! ```json
//! {"version": 1, "signatures": ["00ff00ff00ff00ff", "..."]}
//! ```
//!
//! Writes go to a sibling temp file which is then renamed over the store,
//! so readers never observe a half-written file.

use super::{DEFAULT_STORE_CAPACITY, FingerprintStore, admit};
use crate::models::Signature;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Current on-disk format version.
const FORMAT_VERSION: u32 = 1;

/// Maximum store file size (1MB); far above 300 hex signatures.
const MAX_FILE_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    signatures: Vec<String>,
}

/// Fingerprint store backed by a single JSON file.
///
/// Signatures are cached after the first successful read. A corrupt file
/// is reported by [`FingerprintStore::load`] and replaced by a fresh file
/// on the next insert.
pub struct FilesystemFingerprintStore {
    path: PathBuf,
    capacity: usize,
    cache: Mutex<Option<Vec<Signature>>>,
}

impl FilesystemFingerprintStore {
    /// Creates a store at `path` with the default capacity.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_capacity(path, DEFAULT_STORE_CAPACITY)
    }

    /// Creates a store at `path` with a custom capacity.
    #[must_use]
    pub fn with_capacity(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity: capacity.max(1),
            cache: Mutex::new(None),
        }
    }

    /// Returns the store file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn corruption(&self, cause: impl Into<String>) -> Error {
        Error::StoreCorruption {
            path: self.path.display().to_string(),
            cause: cause.into(),
        }
    }

    fn read_file(&self) -> Result<Vec<Signature>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let metadata = fs::metadata(&self.path).map_err(|e| Error::OperationFailed {
            operation: "read_store_metadata".to_string(),
            cause: e.to_string(),
        })?;
        if metadata.len() > MAX_FILE_SIZE {
            return Err(self.corruption(format!(
                "file exceeds maximum size of {MAX_FILE_SIZE} bytes"
            )));
        }

        let raw = fs::read_to_string(&self.path).map_err(|e| Error::OperationFailed {
            operation: "read_store_file".to_string(),
            cause: e.to_string(),
        })?;

        let file: StoreFile = serde_json::from_str(&raw).map_err(|e| self.corruption(e.to_string()))?;
        if file.version != FORMAT_VERSION {
            return Err(self.corruption(format!("unsupported version {}", file.version)));
        }

        file.signatures
            .iter()
            .map(|s| Signature::from_hex(s).map_err(|e| self.corruption(e.to_string())))
            .collect()
    }

    fn write_file(&self, signatures: &[Signature]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_store_dir".to_string(),
                cause: e.to_string(),
            })?;
        }

        let file = StoreFile {
            version: FORMAT_VERSION,
            signatures: signatures.iter().map(|s| s.to_hex()).collect(),
        };
        let json = serde_json::to_string(&file).map_err(|e| Error::OperationFailed {
            operation: "serialize_store".to_string(),
            cause: e.to_string(),
        })?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| Error::OperationFailed {
            operation: "write_store_tmp".to_string(),
            cause: e.to_string(),
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| Error::OperationFailed {
            operation: "replace_store_file".to_string(),
            cause: e.to_string(),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Vec<Signature>>> {
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl FingerprintStore for FilesystemFingerprintStore {
    fn load(&self) -> Result<Vec<Signature>> {
        let mut cache = self.lock();
        if let Some(signatures) = cache.as_ref() {
            return Ok(signatures.clone());
        }
        let signatures = self.read_file()?;
        *cache = Some(signatures.clone());
        Ok(signatures)
    }

    fn insert(&self, signature: Signature) -> Result<bool> {
        let mut cache = self.lock();
        let mut signatures = match cache.take() {
            Some(signatures) => signatures,
            None => self.read_file().unwrap_or_else(|e| {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Fingerprint store unreadable, starting a fresh one"
                );
                metrics::counter!("fingerprint_store_resets_total").increment(1);
                Vec::new()
            }),
        };

        let inserted = admit(&mut signatures, signature, self.capacity);
        let written = if inserted {
            self.write_file(&signatures)
        } else {
            Ok(())
        };
        *cache = Some(signatures);
        written.map(|()| inserted)
    }

    fn clear(&self) -> Result<()> {
        let mut cache = self.lock();
        self.write_file(&[])?;
        *cache = Some(Vec::new());
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
