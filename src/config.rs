use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PackError, Result};

/// Project-level configuration lives next to the registry documents.
pub const PROJECT_CONFIG: &str = ".packs/config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl Config {
    pub fn load(explicit_path: Option<&Path>, workspace: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("PACKS_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            let patch = Self::load_patch(&path)?.ok_or_else(|| {
                PackError::Config(format!("config file {} not found", path.display()))
            })?;
            config.merge_patch(patch);
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_patch(&workspace.join(PROJECT_CONFIG))? {
                config.merge_patch(project);
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("packs/config.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| PackError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| PackError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.layout {
            self.layout.merge(patch);
        }
        if let Some(patch) = patch.storage {
            self.storage.merge(patch);
        }
        if let Some(patch) = patch.registry {
            self.registry.merge(patch);
        }
        if let Some(patch) = patch.fetch {
            self.fetch.merge(patch);
        }
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("PACKS_MANAGED_DIR") {
            self.layout.managed_dir = value;
        }
        if let Some(value) = lookup("PACKS_SKILL_ENTRY") {
            self.layout.skill_entry = value;
        }
        if let Some(value) = lookup("PACKS_STORAGE_ROOT") {
            self.storage.root = Some(PathBuf::from(value));
        }
        if let Some(value) = parse_u32(&lookup, "PACKS_REGISTRY_MAX_ATTEMPTS")? {
            self.registry.max_attempts = value;
        }
        if let Some(value) = parse_u64(&lookup, "PACKS_REGISTRY_BACKOFF_MS")? {
            self.registry.backoff_ms = value;
        }
        if let Some(value) = lookup("PACKS_GIT_BINARY") {
            self.fetch.git_binary = value;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.registry.max_attempts < 2 {
            return Err(PackError::Config(
                "registry.max_attempts must be at least 2 (one write plus one retry)".to_string(),
            ));
        }
        if self.layout.managed_dir.trim().is_empty() {
            return Err(PackError::Config("layout.managed_dir must be non-empty".to_string()));
        }
        if self.storage.registry_path == self.storage.stacks_path {
            return Err(PackError::Config(
                "storage.registry_path and storage.stacks_path must differ".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LayoutConfig {
    #[serde(default)]
    pub managed_dir: String,
    #[serde(default)]
    pub skill_entry: String,
    #[serde(default)]
    pub agent_extension: String,
    #[serde(default)]
    pub hook_extension: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            managed_dir: ".claude".to_string(),
            skill_entry: "SKILL.md".to_string(),
            agent_extension: "md".to_string(),
            hook_extension: "sh".to_string(),
        }
    }
}

impl LayoutConfig {
    fn merge(&mut self, patch: LayoutPatch) {
        if let Some(value) = patch.managed_dir {
            self.managed_dir = value;
        }
        if let Some(value) = patch.skill_entry {
            self.skill_entry = value;
        }
        if let Some(value) = patch.agent_extension {
            self.agent_extension = value;
        }
        if let Some(value) = patch.hook_extension {
            self.hook_extension = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    /// Root the file backend resolves document paths against. Defaults to the workspace.
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub registry_path: String,
    #[serde(default)]
    pub stacks_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: None,
            registry_path: ".packs/registry.json".to_string(),
            stacks_path: ".packs/stacks.json".to_string(),
        }
    }
}

impl StorageConfig {
    fn merge(&mut self, patch: StoragePatch) {
        if let Some(value) = patch.root {
            self.root = Some(value);
        }
        if let Some(value) = patch.registry_path {
            self.registry_path = value;
        }
        if let Some(value) = patch.stacks_path {
            self.stacks_path = value;
        }
    }

    #[must_use]
    pub fn root_for(&self, workspace: &Path) -> PathBuf {
        match &self.root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => workspace.join(root),
            None => workspace.to_path_buf(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Total write attempts per registry mutation, including the first.
    #[serde(default)]
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    #[serde(default)]
    pub backoff_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 25,
        }
    }
}

impl RegistryConfig {
    fn merge(&mut self, patch: RegistryPatch) {
        if let Some(value) = patch.max_attempts {
            self.max_attempts = value;
        }
        if let Some(value) = patch.backoff_ms {
            self.backoff_ms = value;
        }
    }

    #[must_use]
    pub const fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchConfig {
    #[serde(default)]
    pub git_binary: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            git_binary: "git".to_string(),
        }
    }
}

impl FetchConfig {
    fn merge(&mut self, patch: FetchPatch) {
        if let Some(value) = patch.git_binary {
            self.git_binary = value;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    layout: Option<LayoutPatch>,
    storage: Option<StoragePatch>,
    registry: Option<RegistryPatch>,
    fetch: Option<FetchPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LayoutPatch {
    managed_dir: Option<String>,
    skill_entry: Option<String>,
    agent_extension: Option<String>,
    hook_extension: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StoragePatch {
    root: Option<PathBuf>,
    registry_path: Option<String>,
    stacks_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RegistryPatch {
    max_attempts: Option<u32>,
    backoff_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FetchPatch {
    git_binary: Option<String>,
}

fn parse_u32<F>(lookup: &F, key: &str) -> Result<Option<u32>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value
            .parse::<u32>()
            .map(Some)
            .map_err(|err| PackError::Config(format!("invalid {key} value {value}: {err}"))),
        None => Ok(None),
    }
}

fn parse_u64<F>(lookup: &F, key: &str) -> Result<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|err| PackError::Config(format!("invalid {key} value {value}: {err}"))),
        None => Ok(None),
    }
}
