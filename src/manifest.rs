//! Pack descriptor (`pack.json`) parsing and validation.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::installer::ResourceKind;

/// File name of the descriptor at a pack repository root.
pub const MANIFEST_FILE: &str = "pack.json";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("pack.json not found")]
    Missing,

    #[error("read pack.json: {0}")]
    Unreadable(#[source] std::io::Error),

    #[error("parse pack.json: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("pack name must be non-empty")]
    MissingName,

    #[error("invalid {kind} name {name:?}: {reason}")]
    InvalidResourceName {
        kind: ResourceKind,
        name: String,
        reason: &'static str,
    },

    #[error("duplicate {kind} name {name:?}")]
    DuplicateResource { kind: ResourceKind, name: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackManifest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, rename = "type")]
    pub pack_type: String,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub stacks: Vec<String>,
    #[serde(default)]
    pub contents: PackContents,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackContents {
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub agents: Vec<String>,
    #[serde(default)]
    pub hooks: Vec<String>,
}

impl PackContents {
    #[must_use]
    pub fn names(&self, kind: ResourceKind) -> &[String] {
        match kind {
            ResourceKind::Skill => &self.skills,
            ResourceKind::Agent => &self.agents,
            ResourceKind::Hook => &self.hooks,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty() && self.agents.is_empty() && self.hooks.is_empty()
    }
}

impl PackManifest {
    /// Parse and validate descriptor bytes. No I/O.
    pub fn parse(bytes: &[u8]) -> Result<Self, ManifestError> {
        let mut manifest: Self = serde_json::from_slice(bytes)?;
        manifest.name = manifest.name.trim().to_string();
        manifest.validate()?;
        Ok(manifest)
    }

    /// Read `pack.json` from the root of a checkout.
    pub fn load(dir: &Path) -> Result<Self, ManifestError> {
        let path = dir.join(MANIFEST_FILE);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ManifestError::Missing);
            }
            Err(err) => return Err(ManifestError::Unreadable(err)),
        };
        Self::parse(&bytes)
    }

    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.name.trim().is_empty() {
            return Err(ManifestError::MissingName);
        }
        for kind in ResourceKind::ALL {
            let mut seen = HashSet::new();
            for name in self.contents.names(kind) {
                validate_resource_name(name).map_err(|reason| {
                    ManifestError::InvalidResourceName {
                        kind,
                        name: name.clone(),
                        reason,
                    }
                })?;
                if !seen.insert(name.as_str()) {
                    return Err(ManifestError::DuplicateResource {
                        kind,
                        name: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A resource name must be a single, plain path component.
pub fn validate_resource_name(name: &str) -> Result<(), &'static str> {
    if name.trim().is_empty() {
        return Err("empty name");
    }
    if name.contains('\0') {
        return Err("contains null byte");
    }
    if name.contains('/') || name.contains('\\') {
        return Err("contains path separator");
    }
    if name == "." || name == ".." {
        return Err("path traversal");
    }
    if name.starts_with('.') {
        return Err("starts with a dot");
    }
    Ok(())
}
