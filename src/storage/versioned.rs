//! Typed documents over a [`StorageBackend`] with optimistic concurrency.
//!
//! Every mutation goes through [`VersionedStore::update`]: read, apply the
//! mutation, write with the version that was read. On a version conflict the
//! document is re-read and the mutation applied again to the fresh copy,
//! up to [`RetryPolicy::max_attempts`] writes in total.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::StorageBackend;
use crate::cancel::CancelToken;
use crate::config::RegistryConfig;
use crate::error::{PackError, Result};

/// A decoded document together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total write attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RegistryConfig::default())
    }
}

impl From<&RegistryConfig> for RetryPolicy {
    fn from(config: &RegistryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(2),
            backoff: config.backoff(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(10);
        self.backoff.saturating_mul(factor)
    }
}

pub struct VersionedStore<T> {
    backend: Arc<dyn StorageBackend>,
    path: String,
    retry: RetryPolicy,
    cancel: CancelToken,
    _document: PhantomData<fn() -> T>,
}

impl<T> Clone for VersionedStore<T> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            path: self.path.clone(),
            retry: self.retry,
            cancel: self.cancel.clone(),
            _document: PhantomData,
        }
    }
}

impl<T> VersionedStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(backend: Arc<dyn StorageBackend>, path: impl Into<String>) -> Self {
        Self {
            backend,
            path: path.into(),
            retry: RetryPolicy::default(),
            cancel: CancelToken::default(),
            _document: PhantomData,
        }
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Read the document. An absent document is `T::default()` at version 0.
    pub fn read(&self) -> Result<Versioned<T>> {
        self.cancel.check()?;
        let stored = self.backend.read(&self.path)?;
        let value = match stored.document {
            Some(document) => serde_json::from_value(document).map_err(|err| {
                PackError::Storage(format!("decode {}: {err}", self.path))
            })?,
            None => T::default(),
        };
        Ok(Versioned {
            value,
            version: stored.version,
        })
    }

    /// Write the document if the backend is still at `expected_version`.
    pub fn write(&self, value: &T, expected_version: u64) -> Result<u64> {
        self.cancel.check()?;
        let document = serde_json::to_value(value)
            .map_err(|err| PackError::Storage(format!("encode {}: {err}", self.path)))?;
        self.backend.write(&self.path, &document, expected_version)
    }

    /// Read, mutate and write, retrying on version conflicts.
    pub fn update<R, F>(&self, mutate: F) -> Result<R>
    where
        F: FnMut(&mut T) -> Result<R>,
    {
        let snapshot = self.read()?;
        self.update_from(snapshot, mutate)
    }

    /// Like [`update`](Self::update), but the first attempt mutates an
    /// already-read snapshot. Retries always start from a fresh read.
    ///
    /// An error from `mutate` aborts without writing. A mutation that leaves
    /// the document unchanged skips the write and keeps the version.
    pub fn update_from<R, F>(&self, snapshot: Versioned<T>, mut mutate: F) -> Result<R>
    where
        F: FnMut(&mut T) -> Result<R>,
    {
        let mut current = snapshot;
        let mut attempt = 1;
        loop {
            let before = self.encode(&current.value)?;
            let outcome = mutate(&mut current.value)?;
            if self.encode(&current.value)? == before {
                debug!(target: "registry", path = %self.path, version = current.version, "mutation left document unchanged, skipping write");
                return Ok(outcome);
            }

            match self.write(&current.value, current.version) {
                Ok(version) => {
                    debug!(target: "registry", path = %self.path, version, attempt, "document committed");
                    return Ok(outcome);
                }
                Err(err) if err.is_conflict() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay(attempt);
                    warn!(target: "registry", path = %self.path, expected = current.version, attempt, ?delay, "version conflict, re-reading");
                    std::thread::sleep(delay);
                    attempt += 1;
                    current = self.read()?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn encode(&self, value: &T) -> Result<serde_json::Value> {
        serde_json::to_value(value)
            .map_err(|err| PackError::Storage(format!("encode {}: {err}", self.path)))
    }
}
