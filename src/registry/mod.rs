//! Registry documents: installed packs and user-configured stacks.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::installer::{ResourceKind, ResourceRef};
use crate::manifest::PackManifest;
use crate::storage::VersionedStore;

pub type RegistryStore = VersionedStore<PackRegistry>;
pub type StacksStore = VersionedStore<ProjectStacks>;

/// Installed packs keyed by pack name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackRegistry {
    #[serde(default)]
    pub packs: BTreeMap<String, PackEntry>,
}

impl PackRegistry {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PackEntry> {
        self.packs.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: PackEntry) -> Option<PackEntry> {
        self.packs.insert(name.into(), entry)
    }

    pub fn remove(&mut self, name: &str) -> Option<PackEntry> {
        self.packs.remove(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.packs.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.packs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }

    /// Packs other than `except` that claim a resource.
    pub fn owners_of<'a>(
        &'a self,
        resource: &'a ResourceRef,
        except: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.packs
            .iter()
            .filter(move |(name, entry)| {
                name.as_str() != except
                    && entry.names(resource.kind).iter().any(|n| *n == resource.name)
            })
            .map(|(name, _)| name.as_str())
    }
}

/// What a pack installed, as recorded at install time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackEntry {
    #[serde(default)]
    pub version: String,
    pub repo: String,
    pub installed_at: DateTime<Utc>,
    #[serde(default)]
    pub stacks: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub agents: Vec<String>,
    #[serde(default)]
    pub hooks: Vec<String>,
}

impl PackEntry {
    #[must_use]
    pub fn from_manifest(manifest: &PackManifest, repo: &str) -> Self {
        Self {
            version: manifest.version.clone(),
            repo: repo.to_string(),
            installed_at: Utc::now(),
            stacks: manifest.stacks.clone(),
            skills: manifest.contents.skills.clone(),
            agents: manifest.contents.agents.clone(),
            hooks: manifest.contents.hooks.clone(),
        }
    }

    #[must_use]
    pub fn names(&self, kind: ResourceKind) -> &[String] {
        match kind {
            ResourceKind::Skill => &self.skills,
            ResourceKind::Agent => &self.agents,
            ResourceKind::Hook => &self.hooks,
        }
    }

    pub fn resources(&self) -> impl Iterator<Item = ResourceRef> + '_ {
        ResourceKind::ALL.into_iter().flat_map(move |kind| {
            self.names(kind)
                .iter()
                .map(move |name| ResourceRef::new(kind, name.clone()))
        })
    }

    #[must_use]
    pub fn has_kind(&self, kind: ResourceKind) -> bool {
        !self.names(kind).is_empty()
    }

    /// Resources this entry lists that `newer` no longer does.
    #[must_use]
    pub fn dropped_by(&self, newer: &Self) -> Vec<ResourceRef> {
        self.resources()
            .filter(|r| !newer.names(r.kind).contains(&r.name))
            .collect()
    }
}

/// Stacks configured by hand. Takes precedence over detection when non-empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectStacks {
    #[serde(default)]
    pub stacks: Vec<String>,
}

impl ProjectStacks {
    /// Normalize to lowercase, trimmed, non-empty and duplicate-free, keeping order.
    pub fn normalize<I, S>(values: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for value in values {
            let value = value.as_ref().trim().to_lowercase();
            if !value.is_empty() && !out.contains(&value) {
                out.push(value);
            }
        }
        out
    }
}
