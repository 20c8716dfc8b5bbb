//! Error types for packs.

use std::path::PathBuf;

use thiserror::Error;

use crate::installer::ResourceKind;
use crate::manifest::ManifestError;

#[derive(Error, Debug)]
pub enum PackError {
    #[error("fetch {repo} failed: {message}")]
    Fetch { repo: String, message: String },

    #[error("{repo} is not a pack: {source}")]
    NotAPack {
        repo: String,
        #[source]
        source: ManifestError,
    },

    #[error("install {pack}: copy {kind} {resource} at {}: {source}", path.display())]
    Install {
        pack: String,
        kind: ResourceKind,
        resource: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("pack {0:?} not installed")]
    NotFound(String),

    #[error("{kind} {name:?} not installed")]
    ResourceNotFound { kind: ResourceKind, name: String },

    #[error("version conflict on {path}: expected version {expected}")]
    VersionConflict { path: String, expected: u64 },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("update {pack}: {source}")]
    Update {
        pack: String,
        #[source]
        source: Box<PackError>,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation cancelled")]
    Cancelled,
}

impl PackError {
    /// Stable machine-readable code used in robot output.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch_error",
            Self::NotAPack { .. } => "not_a_pack",
            Self::Install { .. } => "install_error",
            Self::NotFound(_) => "not_found",
            Self::ResourceNotFound { .. } => "resource_not_found",
            Self::VersionConflict { .. } => "version_conflict",
            Self::Storage(_) => "storage_error",
            Self::Update { .. } => "update_error",
            Self::Config(_) => "config_error",
            Self::Io(_) => "io_error",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, PackError>;
