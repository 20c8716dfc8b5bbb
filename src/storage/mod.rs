//! Storage backends for the versioned registry documents.
//!
//! A backend stores JSON documents by path and owns their version tokens.
//! `write` is a compare-and-swap: it succeeds only when the caller's
//! expected version equals the current one, and version `0` means the
//! document does not exist yet.

pub mod file;
pub mod memory;
pub mod versioned;

use serde_json::Value;

use crate::error::Result;

pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use versioned::{RetryPolicy, Versioned, VersionedStore};

/// Version token of a document that has never been written.
pub const ABSENT_VERSION: u64 = 0;

/// A document as read from a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// `None` when the document does not exist.
    pub document: Option<Value>,
    pub version: u64,
}

impl StoredDocument {
    #[must_use]
    pub const fn absent() -> Self {
        Self {
            document: None,
            version: ABSENT_VERSION,
        }
    }
}

pub trait StorageBackend: Send + Sync {
    /// Read a document. A missing document is not an error.
    fn read(&self, path: &str) -> Result<StoredDocument>;

    /// Replace a document if its current version equals `expected_version`.
    ///
    /// Returns the new version, or `PackError::VersionConflict` on mismatch.
    fn write(&self, path: &str, document: &Value, expected_version: u64) -> Result<u64>;
}
