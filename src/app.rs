use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::cancel::CancelToken;
use crate::cli::{Cli, OutputMode};
use crate::config::Config;
use crate::error::{PackError, Result};
use crate::fetch::{Fetcher, SourceFetcher};
use crate::installer::{Layout, Workspace};
use crate::lifecycle::PackManager;
use crate::registry::{RegistryStore, StacksStore};
use crate::storage::{FileBackend, RetryPolicy, StorageBackend};

pub struct AppContext {
    pub workspace: Workspace,
    pub config: Config,
    pub manager: PackManager,
    pub stacks: StacksStore,
    pub output: OutputMode,
    pub verbosity: u8,
}

impl AppContext {
    /// Build the context for one CLI invocation. `cancel` is tripped by the interrupt handler.
    pub fn from_cli(cli: &Cli, cancel: CancelToken) -> Result<Self> {
        let root = resolve_workspace(cli.workspace.as_deref())?;
        let config = Config::load(cli.config.as_deref(), &root)?;
        let storage_root = config.storage.root_for(&root);
        debug!(target: "app", workspace = %root.display(), storage = %storage_root.display(), "context resolved");

        let backend: Arc<dyn StorageBackend> = Arc::new(FileBackend::new(storage_root));
        let fetcher: Arc<dyn Fetcher> = Arc::new(SourceFetcher::from_config(&config.fetch));
        let mut ctx = Self::with_parts(root, config, backend, fetcher).with_cancel(cancel);
        ctx.output = cli.output_mode();
        ctx.verbosity = cli.verbose;
        Ok(ctx)
    }

    /// Assemble a context from explicit parts, bypassing config discovery.
    pub fn with_parts(
        root: PathBuf,
        config: Config,
        backend: Arc<dyn StorageBackend>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let workspace = Workspace::new(root, Layout::from(&config.layout));
        let retry = RetryPolicy::from(&config.registry);
        let registry =
            RegistryStore::new(Arc::clone(&backend), config.storage.registry_path.clone())
                .with_retry(retry);
        let stacks =
            StacksStore::new(backend, config.storage.stacks_path.clone()).with_retry(retry);
        let manager = PackManager::new(workspace.clone(), registry, fetcher);

        Self {
            workspace,
            config,
            manager,
            stacks,
            output: OutputMode::Human,
            verbosity: 0,
        }
    }

    /// Share `cancel` with the pack manager and the stacks store.
    #[must_use]
    pub fn with_cancel(self, cancel: CancelToken) -> Self {
        Self {
            manager: self.manager.with_cancel(cancel.clone()),
            stacks: self.stacks.with_cancel(cancel),
            ..self
        }
    }

    #[must_use]
    pub fn robot(&self) -> bool {
        self.output == OutputMode::Robot
    }
}

/// `--workspace` / `PACKS_WORKSPACE`, else the current directory. Always absolute.
fn resolve_workspace(explicit: Option<&Path>) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    let root = match explicit {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => cwd.join(path),
        None => cwd,
    };
    if !root.is_dir() {
        return Err(PackError::Config(format!(
            "workspace {} is not a directory",
            root.display()
        )));
    }
    Ok(root)
}
