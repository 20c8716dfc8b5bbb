//! In-process storage backend.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;

use super::{ABSENT_VERSION, StorageBackend, StoredDocument};
use crate::error::{PackError, Result};

#[derive(Debug, Default)]
pub struct MemoryBackend {
    documents: Mutex<HashMap<String, (Value, u64)>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current version of a document without reading it.
    #[must_use]
    pub fn version(&self, path: &str) -> u64 {
        self.documents
            .lock()
            .get(path)
            .map_or(ABSENT_VERSION, |(_, version)| *version)
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, path: &str) -> Result<StoredDocument> {
        let documents = self.documents.lock();
        Ok(documents
            .get(path)
            .map_or_else(StoredDocument::absent, |(document, version)| {
                StoredDocument {
                    document: Some(document.clone()),
                    version: *version,
                }
            }))
    }

    fn write(&self, path: &str, document: &Value, expected_version: u64) -> Result<u64> {
        let mut documents = self.documents.lock();
        let current = documents
            .get(path)
            .map_or(ABSENT_VERSION, |(_, version)| *version);
        if current != expected_version {
            return Err(PackError::VersionConflict {
                path: path.to_string(),
                expected: expected_version,
            });
        }
        let next = current + 1;
        documents.insert(path.to_string(), (document.clone(), next));
        Ok(next)
    }
}
