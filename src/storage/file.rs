//! Filesystem storage backend.
//!
//! Each document is a JSON envelope `{"version": N, "document": ...}` under
//! the backend root. Writes take an exclusive advisory lock on a sidecar
//! `.lock` file so the compare-and-swap holds across processes, and replace
//! the document by atomic rename.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use super::{ABSENT_VERSION, StorageBackend, StoredDocument};
use crate::error::{PackError, Result};

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u64,
    document: Value,
}

#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || escapes {
            return Err(PackError::Storage(format!(
                "document path {path:?} must be relative to the storage root"
            )));
        }
        Ok(self.root.join(relative))
    }

    fn read_envelope(file: &Path) -> Result<Option<Envelope>> {
        let raw = match fs::read(file) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(storage_io("read", file, &err)),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|err| PackError::Storage(format!("decode {}: {err}", file.display())))
    }

    fn replace(file: &Path, envelope: &Envelope) -> Result<()> {
        let parent = file.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|err| storage_io("stage", file, &err))?;
        serde_json::to_writer_pretty(&mut tmp, envelope)
            .map_err(|err| PackError::Storage(format!("encode {}: {err}", file.display())))?;
        tmp.write_all(b"\n")
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|err| storage_io("write", file, &err))?;
        tmp.persist(file)
            .map_err(|err| storage_io("persist", file, &err.error))?;
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, path: &str) -> Result<StoredDocument> {
        let file = self.resolve(path)?;
        Ok(match Self::read_envelope(&file)? {
            Some(envelope) => StoredDocument {
                document: Some(envelope.document),
                version: envelope.version,
            },
            None => StoredDocument::absent(),
        })
    }

    fn write(&self, path: &str, document: &Value, expected_version: u64) -> Result<u64> {
        let file = self.resolve(path)?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).map_err(|err| storage_io("create", parent, &err))?;
        }

        let lock_path = lock_path_for(&file);
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|err| storage_io("open lock", &lock_path, &err))?;
        FileExt::lock_exclusive(&lock_file).map_err(|err| storage_io("lock", &lock_path, &err))?;

        let current = Self::read_envelope(&file)?.map_or(ABSENT_VERSION, |e| e.version);
        if current != expected_version {
            trace!(target: "registry", path, current, expected_version, "file backend version mismatch");
            return Err(PackError::VersionConflict {
                path: path.to_string(),
                expected: expected_version,
            });
        }

        let envelope = Envelope {
            version: current + 1,
            document: document.clone(),
        };
        Self::replace(&file, &envelope)?;
        // Dropping `lock_file` releases the lock.
        drop(lock_file);
        Ok(envelope.version)
    }
}

fn lock_path_for(file: &Path) -> PathBuf {
    let mut name = file.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    file.with_file_name(name)
}

fn storage_io(action: &str, path: &Path, err: &io::Error) -> PackError {
    PackError::Storage(format!("{action} {}: {err}", path.display()))
}
