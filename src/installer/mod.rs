//! Filesystem installer for pack resources.
//!
//! Copies declared skills, agents and hooks from a staging checkout into the
//! managed tree of a workspace, and removes them again by name:
//!
//! ```text
//! <workspace>/<managed>/skills/<name>/SKILL.md
//! <workspace>/<managed>/agents/<name>.md
//! <workspace>/<managed>/hooks/<name>.sh      (mode 0755)
//! ```
//!
//! Copying is not transactional. A failure part-way leaves whatever was
//! already copied on disk; callers must not record the pack as installed.

pub mod copy;

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LayoutConfig;
use crate::error::{PackError, Result};
use crate::manifest::{PackManifest, validate_resource_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Skill,
    Agent,
    Hook,
}

impl ResourceKind {
    pub const ALL: [Self; 3] = [Self::Skill, Self::Agent, Self::Hook];

    /// Directory holding this kind, both in a pack repo and in the managed tree.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Skill => "skills",
            Self::Agent => "agents",
            Self::Hook => "hooks",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Skill => "skill",
            Self::Agent => "agent",
            Self::Hook => "hook",
        };
        f.write_str(name)
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skill" | "skills" => Ok(Self::Skill),
            "agent" | "agents" => Ok(Self::Agent),
            "hook" | "hooks" => Ok(Self::Hook),
            other => Err(format!(
                "unknown resource kind {other:?} (expected skills, agents or hooks)"
            )),
        }
    }
}

/// A single named resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

/// Naming conventions of the managed tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub managed_dir: String,
    /// File that marks a directory as a valid skill.
    pub skill_entry: String,
    pub agent_extension: String,
    pub hook_extension: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self::from(&LayoutConfig::default())
    }
}

impl From<&LayoutConfig> for Layout {
    fn from(config: &LayoutConfig) -> Self {
        Self {
            managed_dir: config.managed_dir.clone(),
            skill_entry: config.skill_entry.clone(),
            agent_extension: config.agent_extension.clone(),
            hook_extension: config.hook_extension.clone(),
        }
    }
}

impl Layout {
    /// On-disk name of a resource inside its kind directory.
    #[must_use]
    pub fn file_name(&self, kind: ResourceKind, name: &str) -> String {
        match kind {
            ResourceKind::Skill => name.to_string(),
            ResourceKind::Agent => format!("{name}.{}", self.agent_extension),
            ResourceKind::Hook => format!("{name}.{}", self.hook_extension),
        }
    }

    /// Inverse of [`Layout::file_name`] for single-file kinds.
    fn resource_name(&self, kind: ResourceKind, file_name: &str) -> Option<String> {
        let extension = match kind {
            ResourceKind::Skill => return Some(file_name.to_string()),
            ResourceKind::Agent => &self.agent_extension,
            ResourceKind::Hook => &self.hook_extension,
        };
        file_name
            .strip_suffix(extension.as_str())
            .and_then(|stem| stem.strip_suffix('.'))
            .filter(|stem| !stem.is_empty())
            .map(str::to_string)
    }

    /// Location of a resource inside a pack checkout.
    #[must_use]
    pub fn source_path(&self, checkout: &Path, kind: ResourceKind, name: &str) -> PathBuf {
        checkout
            .join(kind.dir_name())
            .join(self.file_name(kind, name))
    }
}

/// An explicit workspace root plus its layout. Every filesystem operation takes one.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    layout: Layout,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, layout: Layout) -> Self {
        Self {
            root: root.into(),
            layout,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub const fn layout(&self) -> &Layout {
        &self.layout
    }

    #[must_use]
    pub fn managed_root(&self) -> PathBuf {
        self.root.join(&self.layout.managed_dir)
    }

    #[must_use]
    pub fn kind_dir(&self, kind: ResourceKind) -> PathBuf {
        self.managed_root().join(kind.dir_name())
    }

    #[must_use]
    pub fn resource_path(&self, kind: ResourceKind, name: &str) -> PathBuf {
        self.kind_dir(kind).join(self.layout.file_name(kind, name))
    }

    /// Whether a resource is physically installed. A skill counts only with its entry file.
    #[must_use]
    pub fn resource_present(&self, kind: ResourceKind, name: &str) -> bool {
        let path = self.resource_path(kind, name);
        match kind {
            ResourceKind::Skill => path.join(&self.layout.skill_entry).is_file(),
            ResourceKind::Agent | ResourceKind::Hook => path.is_file(),
        }
    }

    /// Names of installed resources of one kind, sorted.
    #[must_use]
    pub fn installed(&self, kind: ResourceKind) -> Vec<String> {
        let Ok(entries) = fs::read_dir(self.kind_dir(kind)) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(std::result::Result::ok)
            .filter_map(|entry| {
                let file_name = entry.file_name().into_string().ok()?;
                let name = self.layout.resource_name(kind, &file_name)?;
                self.resource_present(kind, &name).then_some(name)
            })
            .collect();
        names.sort();
        names
    }

    /// Text of an installed resource: a skill's entry file, or the agent or hook file.
    pub fn read_content(&self, kind: ResourceKind, name: &str) -> Result<String> {
        let not_found = || PackError::ResourceNotFound {
            kind,
            name: name.to_string(),
        };
        validate_resource_name(name).map_err(|_| not_found())?;

        let path = match kind {
            ResourceKind::Skill => self
                .resource_path(kind, name)
                .join(&self.layout.skill_entry),
            ResourceKind::Agent | ResourceKind::Hook => self.resource_path(kind, name),
        };
        match fs::read_to_string(&path) {
            Ok(content) => Ok(content),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(not_found()),
            Err(err) => Err(PackError::Io(io::Error::new(
                err.kind(),
                format!("read {}: {err}", path.display()),
            ))),
        }
    }

    #[must_use]
    pub fn installed_skills(&self) -> Vec<String> {
        self.installed(ResourceKind::Skill)
    }

    #[must_use]
    pub fn installed_agents(&self) -> Vec<String> {
        self.installed(ResourceKind::Agent)
    }

    #[must_use]
    pub fn installed_hooks(&self) -> Vec<String> {
        self.installed(ResourceKind::Hook)
    }
}

/// Copy every resource the manifest declares from `staging` into the workspace.
pub fn copy_resources(staging: &Path, workspace: &Workspace, manifest: &PackManifest) -> Result<()> {
    let layout = workspace.layout();
    for kind in ResourceKind::ALL {
        for name in manifest.contents.names(kind) {
            let src = layout.source_path(staging, kind, name);
            let dst = workspace.resource_path(kind, name);
            debug!(target: "install", pack = %manifest.name, %kind, resource = %name, dst = %dst.display(), "copying resource");

            copy_resource(layout, kind, &src, &dst).map_err(|source| PackError::Install {
                pack: manifest.name.clone(),
                kind,
                resource: name.clone(),
                path: src.clone(),
                source,
            })?;
        }
    }
    Ok(())
}

fn copy_resource(layout: &Layout, kind: ResourceKind, src: &Path, dst: &Path) -> io::Result<()> {
    match kind {
        ResourceKind::Skill => {
            if !src.join(&layout.skill_entry).is_file() {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("skill has no {}", layout.skill_entry),
                ));
            }
            // Replace rather than merge so stale files from an older version do not linger.
            remove_path(dst, true)?;
            copy::copy_dir(src, dst)?;
        }
        ResourceKind::Agent => {
            copy::copy_file(src, dst)?;
        }
        ResourceKind::Hook => {
            copy::copy_file(src, dst)?;
            copy::set_executable(dst)?;
        }
    }
    Ok(())
}

/// Outcome of [`remove_resources`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RemovalReport {
    pub removed: Vec<ResourceRef>,
    /// Resources that were already gone.
    pub absent: Vec<ResourceRef>,
}

/// Delete named resources from the workspace.
///
/// A missing target is not an error. Every target is attempted even when one
/// fails; the first failure is returned afterwards.
pub fn remove_resources(
    workspace: &Workspace,
    skills: &[String],
    agents: &[String],
    hooks: &[String],
) -> Result<RemovalReport> {
    let mut report = RemovalReport::default();
    let mut first_error: Option<PackError> = None;

    let targets = [
        (ResourceKind::Skill, skills),
        (ResourceKind::Agent, agents),
        (ResourceKind::Hook, hooks),
    ];
    for (kind, names) in targets {
        for name in names {
            let path = workspace.resource_path(kind, name);
            match remove_path(&path, kind == ResourceKind::Skill) {
                Ok(true) => report.removed.push(ResourceRef::new(kind, name.clone())),
                Ok(false) => report.absent.push(ResourceRef::new(kind, name.clone())),
                Err(err) => {
                    warn!(target: "remove", %kind, resource = %name, path = %path.display(), error = %err, "failed to remove resource");
                    if first_error.is_none() {
                        first_error = Some(PackError::Io(io::Error::new(
                            err.kind(),
                            format!("remove {}: {err}", path.display()),
                        )));
                    }
                }
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(report),
    }
}

/// Remove a file or directory. Returns whether anything was there.
fn remove_path(path: &Path, is_dir: bool) -> io::Result<bool> {
    let result = if is_dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}
