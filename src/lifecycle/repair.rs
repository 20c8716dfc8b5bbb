//! Reconcile the registry with what is actually on disk.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{info, warn};

use super::PackManager;
use crate::error::Result;
use crate::installer::{ResourceKind, ResourceRef};

/// Resources a registered pack claims but that are not installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingResources {
    pub pack: String,
    pub resources: Vec<ResourceRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairFailure {
    pub pack: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub missing: Vec<MissingResources>,
    /// Installed resources no registered pack claims. Reported, never deleted.
    pub orphans: Vec<ResourceRef>,
    pub reinstalled: Vec<String>,
    pub failed: Vec<RepairFailure>,
}

impl RepairReport {
    /// True when nothing is missing and every attempted fix succeeded.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.failed.is_empty() && (self.missing.is_empty() || self.all_fixed())
    }

    fn all_fixed(&self) -> bool {
        self.missing
            .iter()
            .all(|m| self.reinstalled.contains(&m.pack))
    }
}

impl PackManager {
    /// Find registry entries whose files are gone and files nobody claims.
    /// With `fix`, reinstall every pack with missing resources.
    pub fn repair(&self, fix: bool) -> Result<RepairReport> {
        let registry = self.registry().read()?.value;
        let workspace = self.workspace();
        let mut report = RepairReport::default();

        for (name, entry) in &registry.packs {
            let resources: Vec<ResourceRef> = entry
                .resources()
                .filter(|r| !workspace.resource_present(r.kind, &r.name))
                .collect();
            if !resources.is_empty() {
                warn!(target: "repair", pack = %name, missing = resources.len(), "pack has missing resources");
                report.missing.push(MissingResources {
                    pack: name.clone(),
                    resources,
                });
            }
        }

        for kind in ResourceKind::ALL {
            let claimed: BTreeSet<&str> = registry
                .packs
                .values()
                .flat_map(|entry| entry.names(kind).iter().map(String::as_str))
                .collect();
            report.orphans.extend(
                workspace
                    .installed(kind)
                    .into_iter()
                    .filter(|name| !claimed.contains(name.as_str()))
                    .map(|name| ResourceRef::new(kind, name)),
            );
        }

        if fix {
            for missing in &report.missing {
                let Some(entry) = registry.get(&missing.pack) else {
                    continue;
                };
                match self.install(&entry.repo, None) {
                    Ok(outcome) if outcome.name != missing.pack => {
                        // The old entry's resources are still missing.
                        warn!(target: "repair", pack = %missing.pack, installed_as = %outcome.name, "repo now installs under a different name");
                        report.failed.push(RepairFailure {
                            pack: missing.pack.clone(),
                            error: format!("repo {} now installs as {:?}", entry.repo, outcome.name),
                        });
                    }
                    Ok(_) => report.reinstalled.push(missing.pack.clone()),
                    Err(err) => {
                        warn!(target: "repair", pack = %missing.pack, error = %err, "reinstall failed");
                        report.failed.push(RepairFailure {
                            pack: missing.pack.clone(),
                            error: err.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            target: "repair",
            missing = report.missing.len(),
            orphans = report.orphans.len(),
            reinstalled = report.reinstalled.len(),
            failed = report.failed.len(),
            "repair scan complete"
        );
        Ok(report)
    }
}
