//! Near-duplicate detection for candidate items.
//!
//! Every candidate gets a 64-bit SimHash signature. A candidate whose
//! signature lies within the configured Hamming distance of one already
//! admitted (this session, or in the persisted store) is rejected.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                   DeduplicationService                     │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐  │
//! │  │ Fingerprinter│  │ Session set  │  │ FingerprintStore │  │
//! │  │              │  │              │  │                  │  │
//! │  │ SimHash over │  │ RwLock<Vec>  │  │ JSON file, FIFO  │  │
//! │  │ 1/2/3-grams  │  │ this process │  │ trim at cap      │  │
//! │  └──────────────┘  └──────────────┘  └──────────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod service;
mod simhash;
mod types;

pub use config::DeduplicationConfig;
pub use service::DeduplicationService;
pub use simhash::{Fingerprinter, normalize};
pub use types::{DuplicateCheckResult, DuplicateReason};
