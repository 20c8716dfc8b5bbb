//! Project technology stacks: configured by hand or detected from marker files.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::registry::{ProjectStacks, StacksStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedStack {
    pub name: String,
    pub evidence: String,
}

enum Probe {
    /// Any of these files (or glob patterns) in the workspace root.
    Files {
        names: &'static [&'static str],
        patterns: &'static [&'static str],
    },
    /// A dependency or devDependency in `package.json`.
    PackageDependency(&'static str),
}

const fn files(names: &'static [&'static str]) -> Probe {
    Probe::Files {
        names,
        patterns: &[],
    }
}

const PROBES: &[(&str, Probe)] = &[
    ("go", files(&["go.mod", "go.work"])),
    ("rust", files(&["Cargo.toml"])),
    ("react", Probe::PackageDependency("react")),
    ("typescript", files(&["tsconfig.json"])),
    ("python", files(&["pyproject.toml", "requirements.txt", "setup.py"])),
    ("ruby", files(&["Gemfile"])),
    ("java", files(&["pom.xml", "build.gradle"])),
    ("kotlin", files(&["build.gradle.kts"])),
    (
        "swift",
        Probe::Files {
            names: &["Package.swift"],
            patterns: &["*.xcodeproj"],
        },
    ),
    (
        "csharp",
        Probe::Files {
            names: &[],
            patterns: &["*.csproj", "*.sln"],
        },
    ),
    ("php", files(&["composer.json"])),
    (
        "docker",
        files(&["Dockerfile", "docker-compose.yml", "docker-compose.yaml"]),
    ),
];

impl Probe {
    fn evidence(&self, root: &Path) -> Option<String> {
        match self {
            Self::Files { names, patterns } => names
                .iter()
                .find(|name| root.join(name).exists())
                .map(|name| format!("{name} found"))
                .or_else(|| patterns.iter().find_map(|pattern| first_match(root, pattern))),
            Self::PackageDependency(dep) => package_dependency(root, dep),
        }
    }
}

fn first_match(root: &Path, pattern: &str) -> Option<String> {
    let full = format!(
        "{}/{pattern}",
        glob::Pattern::escape(&root.to_string_lossy())
    );
    let path = glob::glob(&full).ok()?.find_map(std::result::Result::ok)?;
    let name = path.file_name()?.to_string_lossy().into_owned();
    Some(format!("{name} found"))
}

#[derive(Deserialize, Default)]
struct PackageJson {
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: BTreeMap<String, serde_json::Value>,
}

fn package_dependency(root: &Path, dep: &str) -> Option<String> {
    let raw = fs::read(root.join("package.json")).ok()?;
    let package: PackageJson = serde_json::from_slice(&raw).ok()?;
    if package.dependencies.contains_key(dep) {
        Some(format!("{dep} in dependencies"))
    } else if package.dev_dependencies.contains_key(dep) {
        Some(format!("{dep} in devDependencies"))
    } else {
        None
    }
}

/// Probe the workspace root for well-known marker files.
#[must_use]
pub fn detect_stacks(root: &Path) -> Vec<DetectedStack> {
    let detected: Vec<DetectedStack> = PROBES
        .iter()
        .filter_map(|(name, probe)| {
            probe.evidence(root).map(|evidence| DetectedStack {
                name: (*name).to_string(),
                evidence,
            })
        })
        .collect();
    debug!(target: "stacks", root = %root.display(), count = detected.len(), "stack detection complete");
    detected
}

pub fn configured_stacks(store: &StacksStore) -> Result<Vec<String>> {
    Ok(store.read()?.value.stacks)
}

/// Replace the configured stacks. Returns the stored list.
pub fn set_stacks<S: AsRef<str>>(store: &StacksStore, stacks: &[S]) -> Result<Vec<String>> {
    let normalized = ProjectStacks::normalize(stacks);
    store.update(|doc| {
        doc.stacks.clone_from(&normalized);
        Ok(doc.stacks.clone())
    })
}

pub fn add_stacks<S: AsRef<str>>(store: &StacksStore, stacks: &[S]) -> Result<Vec<String>> {
    store.update(|doc| {
        let merged = doc
            .stacks
            .iter()
            .map(String::as_str)
            .chain(stacks.iter().map(|s| s.as_ref()));
        doc.stacks = ProjectStacks::normalize(merged);
        Ok(doc.stacks.clone())
    })
}

pub fn remove_stacks<S: AsRef<str>>(store: &StacksStore, stacks: &[S]) -> Result<Vec<String>> {
    let drop = ProjectStacks::normalize(stacks);
    store.update(|doc| {
        doc.stacks.retain(|s| !drop.contains(s));
        Ok(doc.stacks.clone())
    })
}

pub fn clear_stacks(store: &StacksStore) -> Result<()> {
    store.update(|doc| {
        doc.stacks.clear();
        Ok(())
    })
}

/// Configured stacks when any are set, detected ones otherwise.
pub fn effective_stacks(store: &StacksStore, root: &Path) -> Result<Vec<String>> {
    let configured = configured_stacks(store)?;
    if !configured.is_empty() {
        return Ok(configured);
    }
    Ok(detect_stacks(root).into_iter().map(|s| s.name).collect())
}
