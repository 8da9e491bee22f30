//! Storage layer.
//!
//! Holds the persisted SimHash fingerprint history that lets duplicate
//! detection survive restarts:
//! - **Filesystem**: JSON file with atomic replace (production)
//! - **Memory**: in-process only (tests, `store.path` unset)

pub mod fingerprint;

pub use fingerprint::{FilesystemFingerprintStore, FingerprintStore, MemoryFingerprintStore};
