//! Fetching pack repositories into private staging directories.
//!
//! A [`Staging`] directory is deleted when dropped, on success and failure alike.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::error::{PackError, Result};
use crate::installer::copy;

/// A private checkout of a pack repository.
#[derive(Debug)]
pub struct Staging {
    dir: TempDir,
}

impl Staging {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("packs-staging-").tempdir()?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

pub trait Fetcher: Send + Sync {
    /// Materialize `repo` at `reference` (latest when `None`) into a new staging directory.
    fn fetch(&self, repo: &str, reference: Option<&str>) -> Result<Staging>;
}

/// Shallow clone with the `git` binary.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    git_bin: PathBuf,
}

impl GitFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::with_binary("git")
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            git_bin: binary.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &FetchConfig) -> Self {
        Self::with_binary(&config.git_binary)
    }

    /// `github.com/org/repo` becomes `https://github.com/org/repo.git`; URLs pass through.
    #[must_use]
    pub fn clone_url(repo: &str) -> String {
        let repo = repo.trim();
        if repo.contains("://") || repo.starts_with("git@") {
            repo.to_string()
        } else {
            format!("https://{}.git", repo.trim_end_matches(".git"))
        }
    }
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for GitFetcher {
    fn fetch(&self, repo: &str, reference: Option<&str>) -> Result<Staging> {
        let git = which::which(&self.git_bin).map_err(|err| PackError::Fetch {
            repo: repo.to_string(),
            message: format!("{} not found in PATH: {err}", self.git_bin.display()),
        })?;

        let staging = Staging::new()?;
        let url = Self::clone_url(repo);

        let mut cmd = Command::new(git);
        cmd.args(["clone", "--depth", "1", "--quiet"]);
        if let Some(reference) = reference {
            cmd.args(["--branch", reference]);
        }
        cmd.arg(&url)
            .arg(staging.path())
            .stdin(Stdio::null())
            .env("GIT_TERMINAL_PROMPT", "0");
        debug!(target: "fetch", %url, reference, "cloning pack repository");

        let output = cmd.output().map_err(|err| PackError::Fetch {
            repo: repo.to_string(),
            message: format!("failed to execute git: {err}"),
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PackError::Fetch {
                repo: repo.to_string(),
                message: format!("git clone {url} failed: {}", stderr.trim()),
            });
        }
        Ok(staging)
    }
}

/// Copies a local directory (minus `.git`) into staging.
#[derive(Debug, Clone, Default)]
pub struct LocalFetcher;

impl Fetcher for LocalFetcher {
    fn fetch(&self, repo: &str, reference: Option<&str>) -> Result<Staging> {
        let src = Path::new(repo);
        if !src.is_dir() {
            return Err(PackError::Fetch {
                repo: repo.to_string(),
                message: "not a directory".to_string(),
            });
        }
        if let Some(reference) = reference {
            warn!(target: "fetch", repo, reference, "ref ignored for local directory");
        }

        let staging = Staging::new()?;
        copy::copy_dir_filtered(src, staging.path(), |entry| entry.file_name() != ".git")
            .map_err(|err| PackError::Fetch {
                repo: repo.to_string(),
                message: format!("copy: {err}"),
            })?;
        Ok(staging)
    }
}

/// Local directories go through [`LocalFetcher`], everything else through git.
#[derive(Debug, Clone, Default)]
pub struct SourceFetcher {
    git: GitFetcher,
    local: LocalFetcher,
}

impl SourceFetcher {
    #[must_use]
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            git: GitFetcher::from_config(config),
            local: LocalFetcher,
        }
    }
}

impl Fetcher for SourceFetcher {
    fn fetch(&self, repo: &str, reference: Option<&str>) -> Result<Staging> {
        if Path::new(repo).is_dir() {
            self.local.fetch(repo, reference)
        } else {
            self.git.fetch(repo, reference)
        }
    }
}
