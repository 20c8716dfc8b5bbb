//! Install, update and remove packs across the workspace and the registry.
//!
//! Filesystem work always happens before the registry commit:
//!
//! - **install**: fetch, parse, copy, then commit the entry. A failed copy
//!   never reaches the registry.
//! - **remove**: delete files, then drop the entry. A crash in between leaves
//!   an entry whose files are gone, which a reinstall or `repair` heals.
//!   Resources another installed pack also claims stay on disk.
//! - **update**: read the registry once, refresh every target on disk, then
//!   commit all refreshed entries in one write. If a reinstall fails the batch
//!   stops before writing, so packs refreshed earlier are newer on disk than
//!   in the registry until the next successful run.

pub mod repair;

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::{PackError, Result};
use crate::fetch::Fetcher;
use crate::installer::{self, RemovalReport, ResourceKind, ResourceRef, Workspace};
use crate::manifest::PackManifest;
use crate::registry::{PackEntry, PackRegistry, RegistryStore};

pub use repair::{MissingResources, RepairFailure, RepairReport};

pub struct PackManager {
    workspace: Workspace,
    registry: RegistryStore,
    fetcher: Arc<dyn Fetcher>,
    cancel: CancelToken,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallOutcome {
    pub name: String,
    pub entry: PackEntry,
    /// The entry this install replaced, if the pack was already installed.
    pub previous: Option<PackEntry>,
    /// Resources this pack shares with other installed packs.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contested: Vec<ContestedResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContestedResource {
    pub resource: ResourceRef,
    pub owner: String,
}

impl fmt::Display for ContestedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is also claimed by {}", self.resource, self.owner)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateTarget {
    One(String),
    All,
}

impl From<Option<String>> for UpdateTarget {
    fn from(name: Option<String>) -> Self {
        name.map_or(Self::All, Self::One)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionChange {
    Upgraded,
    Downgraded,
    Unchanged,
    /// At least one side is not semver and they differ.
    Incomparable,
}

impl VersionChange {
    #[must_use]
    pub fn classify(from: &str, to: &str) -> Self {
        let parse = |v: &str| semver::Version::parse(v.trim().trim_start_matches('v')).ok();
        match (parse(from), parse(to)) {
            (Some(from), Some(to)) => match to.cmp(&from) {
                Ordering::Greater => Self::Upgraded,
                Ordering::Less => Self::Downgraded,
                Ordering::Equal => Self::Unchanged,
            },
            _ if from.trim() == to.trim() => Self::Unchanged,
            _ => Self::Incomparable,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdatedPack {
    pub name: String,
    pub from_version: String,
    pub to_version: String,
    pub change: VersionChange,
    pub entry: PackEntry,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateReport {
    pub updated: Vec<UpdatedPack>,
}

impl PackManager {
    pub fn new(workspace: Workspace, registry: RegistryStore, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            workspace,
            registry,
            fetcher,
            cancel: CancelToken::default(),
        }
    }

    /// Share a cancellation token with this manager and its registry store.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.registry = self.registry.with_cancel(cancel.clone());
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub const fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    #[must_use]
    pub const fn registry(&self) -> &RegistryStore {
        &self.registry
    }

    /// Install `repo` at `reference` and record it in the registry.
    pub fn install(&self, repo: &str, reference: Option<&str>) -> Result<InstallOutcome> {
        info!(target: "install", repo, reference, "installing pack");
        let manifest = self.place(repo, reference)?;
        let name = manifest.name.clone();
        let entry = PackEntry::from_manifest(&manifest, repo);

        // Files are on disk; only the commit is retried on conflict.
        let (previous, contested, stale) = self.registry.update(|registry| {
            let contested = contested_resources(registry, &name, &entry);
            let previous = registry.insert(name.clone(), entry.clone());
            let stale = previous
                .as_ref()
                .map(|prev| unclaimed(registry, &name, prev.dropped_by(&entry)))
                .unwrap_or_default();
            Ok((previous, contested, stale))
        })?;

        for shared in &contested {
            warn!(target: "install", pack = %name, resource = %shared.resource, owner = %shared.owner, "resource is also claimed by another pack");
        }
        if !stale.is_empty() {
            self.prune(&name, &stale);
        }

        info!(target: "install", pack = %name, version = %entry.version, "pack installed");
        Ok(InstallOutcome {
            name,
            entry,
            previous,
            contested,
        })
    }

    /// Remove an installed pack's files and its registry entry.
    pub fn remove(&self, name: &str) -> Result<PackEntry> {
        let snapshot = self.registry.read()?;
        let entry = snapshot
            .value
            .get(name)
            .cloned()
            .ok_or_else(|| PackError::NotFound(name.to_string()))?;

        let owned = unclaimed(&snapshot.value, name, entry.resources());
        let shared = entry.resources().count() - owned.len();
        if shared > 0 {
            info!(target: "remove", pack = name, shared, "keeping resources claimed by other packs");
        }

        self.cancel.check()?;
        match self.delete(&owned) {
            Ok(report) => {
                debug!(target: "remove", pack = name, removed = report.removed.len(), absent = report.absent.len(), "resources removed");
            }
            Err(err) => {
                warn!(target: "remove", pack = name, error = %err, "resource removal incomplete, dropping registry entry anyway");
            }
        }

        self.registry.update_from(snapshot, |registry| {
            registry.remove(name);
            Ok(())
        })?;

        info!(target: "remove", pack = name, "pack removed");
        Ok(entry)
    }

    /// Reinstall one or all packs from their recorded repos at latest.
    pub fn update(&self, target: &UpdateTarget) -> Result<UpdateReport> {
        let snapshot = self.registry.read()?;
        let targets: Vec<(String, PackEntry)> = match target {
            UpdateTarget::One(name) => {
                let entry = snapshot
                    .value
                    .get(name)
                    .cloned()
                    .ok_or_else(|| PackError::NotFound(name.clone()))?;
                vec![(name.clone(), entry)]
            }
            UpdateTarget::All => snapshot
                .value
                .packs
                .iter()
                .map(|(name, entry)| (name.clone(), entry.clone()))
                .collect(),
        };
        if targets.is_empty() {
            return Ok(UpdateReport::default());
        }

        let mut refreshed = Vec::with_capacity(targets.len());
        for (name, old) in targets {
            info!(target: "update", pack = %name, repo = %old.repo, "refreshing pack");
            let owned = unclaimed(&snapshot.value, &name, old.resources());
            if let Err(err) = self.delete(&owned) {
                warn!(target: "update", pack = %name, error = %err, "stale resources not fully removed; reinstall will overwrite");
            }

            let manifest = self
                .place(&old.repo, None)
                .map_err(|source| PackError::Update {
                    pack: name.clone(),
                    source: Box::new(source),
                })?;
            if manifest.name != name {
                warn!(target: "update", pack = %name, manifest_name = %manifest.name, "pack renamed upstream; keeping registry name");
            }

            let entry = PackEntry::from_manifest(&manifest, &old.repo);
            refreshed.push(UpdatedPack {
                change: VersionChange::classify(&old.version, &entry.version),
                from_version: old.version,
                to_version: entry.version.clone(),
                name,
                entry,
            });
        }

        self.registry.update_from(snapshot, |registry| {
            for pack in &refreshed {
                if registry.contains(&pack.name) {
                    registry.insert(pack.name.clone(), pack.entry.clone());
                } else {
                    warn!(target: "update", pack = %pack.name, "pack removed concurrently; not re-recording it");
                }
            }
            Ok(())
        })?;

        info!(target: "update", count = refreshed.len(), "packs updated");
        Ok(UpdateReport { updated: refreshed })
    }

    /// Installed packs, optionally only those with at least one resource of `kind`.
    pub fn list(&self, kind: Option<ResourceKind>) -> Result<Vec<(String, PackEntry)>> {
        let registry = self.registry.read()?.value;
        Ok(registry
            .packs
            .into_iter()
            .filter(|(_, entry)| kind.is_none_or(|kind| entry.has_kind(kind)))
            .collect())
    }

    pub fn get(&self, name: &str) -> Result<PackEntry> {
        self.registry
            .read()?
            .value
            .remove(name)
            .ok_or_else(|| PackError::NotFound(name.to_string()))
    }

    /// Fetch, parse and copy. The staging directory is gone when this returns.
    fn place(&self, repo: &str, reference: Option<&str>) -> Result<PackManifest> {
        self.cancel.check()?;
        let staging = self.fetcher.fetch(repo, reference)?;
        let manifest = PackManifest::load(staging.path()).map_err(|source| PackError::NotAPack {
            repo: repo.to_string(),
            source,
        })?;
        debug!(target: "install", pack = %manifest.name, staging = %staging.path().display(), "manifest parsed");

        self.cancel.check()?;
        installer::copy_resources(staging.path(), &self.workspace, &manifest)?;
        Ok(manifest)
    }

    fn delete(&self, resources: &[ResourceRef]) -> Result<RemovalReport> {
        let names = |kind: ResourceKind| -> Vec<String> {
            resources
                .iter()
                .filter(|r| r.kind == kind)
                .map(|r| r.name.clone())
                .collect()
        };
        installer::remove_resources(
            &self.workspace,
            &names(ResourceKind::Skill),
            &names(ResourceKind::Agent),
            &names(ResourceKind::Hook),
        )
    }

    fn prune(&self, pack: &str, stale: &[ResourceRef]) {
        match self.delete(stale) {
            Ok(report) => {
                debug!(target: "install", pack, pruned = report.removed.len(), "pruned resources dropped by new version");
            }
            Err(err) => {
                warn!(target: "install", pack, error = %err, "failed to prune dropped resources");
            }
        }
    }
}

/// The subset of `resources` that no pack other than `name` claims.
fn unclaimed(
    registry: &PackRegistry,
    name: &str,
    resources: impl IntoIterator<Item = ResourceRef>,
) -> Vec<ResourceRef> {
    resources
        .into_iter()
        .filter(|r| registry.owners_of(r, name).next().is_none())
        .collect()
}

/// Resources of `entry` already claimed by packs other than `name`.
fn contested_resources(
    registry: &PackRegistry,
    name: &str,
    entry: &PackEntry,
) -> Vec<ContestedResource> {
    entry
        .resources()
        .flat_map(|resource| {
            registry
                .owners_of(&resource, name)
                .map(str::to_string)
                .collect::<Vec<_>>()
                .into_iter()
                .map(move |owner| ContestedResource {
                    resource: resource.clone(),
                    owner,
                })
        })
        .collect()
}
