//! Pack repositories on disk and a manager wired to an in-memory registry.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use packs::cancel::CancelToken;
use packs::fetch::{Fetcher, LocalFetcher, Staging};
use packs::installer::{Layout, Workspace};
use packs::lifecycle::PackManager;
use packs::registry::{PackEntry, PackRegistry, RegistryStore};
use packs::storage::{MemoryBackend, RetryPolicy, StorageBackend, StoredDocument};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tempfile::TempDir;

pub const REGISTRY_PATH: &str = ".packs/registry.json";

/// A local pack repository that can be rewritten between installs.
pub struct TestPack {
    dir: TempDir,
    pub name: String,
    pub version: String,
    pub skills: Vec<String>,
    pub agents: Vec<String>,
    pub hooks: Vec<String>,
}

impl TestPack {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            dir: tempfile::tempdir().expect("pack tempdir"),
            name: name.to_string(),
            version: version.to_string(),
            skills: Vec::new(),
            agents: Vec::new(),
            hooks: Vec::new(),
        }
    }

    pub fn skill(mut self, name: &str) -> Self {
        self.skills.push(name.to_string());
        self
    }

    pub fn agent(mut self, name: &str) -> Self {
        self.agents.push(name.to_string());
        self
    }

    pub fn hook(mut self, name: &str) -> Self {
        self.hooks.push(name.to_string());
        self
    }

    /// Write `pack.json` and one file per declared resource, tagged with the version.
    pub fn write(self) -> Self {
        let root = self.dir.path();
        let manifest = json!({
            "name": self.name,
            "version": self.version,
            "type": "pack",
            "stacks": ["go"],
            "contents": {
                "skills": self.skills,
                "agents": self.agents,
                "hooks": self.hooks,
            },
        });
        fs::write(root.join("pack.json"), manifest.to_string()).expect("write pack.json");

        for skill in &self.skills {
            let dir = root.join("skills").join(skill);
            fs::create_dir_all(&dir).expect("skill dir");
            fs::write(dir.join("SKILL.md"), self.body(skill)).expect("SKILL.md");
        }
        for agent in &self.agents {
            write_file(&root.join("agents").join(format!("{agent}.md")), &self.body(agent));
        }
        for hook in &self.hooks {
            write_file(&root.join("hooks").join(format!("{hook}.sh")), &self.body(hook));
        }
        self
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn repo(&self) -> String {
        self.dir.path().to_string_lossy().into_owned()
    }

    pub fn body(&self, resource: &str) -> String {
        format!("{resource} from {} {}\n", self.name, self.version)
    }
}

fn write_file(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().expect("parent")).expect("parent dir");
    fs::write(path, contents).expect("write resource");
}

/// A workspace, an in-memory registry and a manager over both.
pub struct Harness {
    workspace_dir: TempDir,
    pub backend: Arc<MemoryBackend>,
    pub manager: PackManager,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_cancel(CancelToken::new())
    }

    pub fn with_cancel(cancel: CancelToken) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let storage: Arc<dyn StorageBackend> = Arc::clone(&backend) as Arc<dyn StorageBackend>;
        Self::assemble(backend, storage, Arc::new(LocalFetcher)).with_cancel_token(cancel)
    }

    /// A manager whose registry writes go through `contended` and whose fetches are counted.
    pub fn contended(contended: &Arc<Contended>, fetcher: Arc<CountingFetcher>) -> Self {
        let storage: Arc<dyn StorageBackend> = Arc::clone(contended) as Arc<dyn StorageBackend>;
        Self::assemble(Arc::clone(&contended.memory), storage, fetcher)
    }

    fn assemble(
        backend: Arc<MemoryBackend>,
        storage: Arc<dyn StorageBackend>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let workspace_dir = tempfile::tempdir().expect("workspace tempdir");
        let workspace = Workspace::new(workspace_dir.path(), Layout::default());
        let manager = PackManager::new(workspace, store_over(storage), fetcher);
        Self {
            workspace_dir,
            backend,
            manager,
        }
    }

    fn with_cancel_token(self, cancel: CancelToken) -> Self {
        Self {
            manager: self.manager.with_cancel(cancel),
            ..self
        }
    }

    pub fn root(&self) -> &Path {
        self.workspace_dir.path()
    }

    pub fn managed(&self, relative: &str) -> PathBuf {
        self.root().join(".claude").join(relative)
    }

    pub fn registry(&self) -> PackRegistry {
        self.manager.registry().read().expect("read registry").value
    }

    pub fn registry_version(&self) -> u64 {
        self.backend.version(REGISTRY_PATH)
    }
}

/// A registry store over `backend` that retries without sleeping.
pub fn store(backend: &Arc<MemoryBackend>) -> RegistryStore {
    store_over(Arc::clone(backend) as Arc<dyn StorageBackend>)
}

fn store_over(backend: Arc<dyn StorageBackend>) -> RegistryStore {
    RegistryStore::new(backend, REGISTRY_PATH).with_retry(RetryPolicy {
        max_attempts: 3,
        backoff: std::time::Duration::ZERO,
    })
}

/// An entry for a pack that never touched the workspace.
pub fn foreign_entry(agent: &str) -> PackEntry {
    PackEntry {
        version: "0.1.0".to_string(),
        repo: "example.com/foreign".to_string(),
        installed_at: Utc::now(),
        stacks: Vec::new(),
        skills: Vec::new(),
        agents: vec![agent.to_string()],
        hooks: Vec::new(),
    }
}

type RegistryChange = Box<dyn FnOnce(&mut PackRegistry) + Send>;

/// A memory backend where another writer commits a queued change just
/// before the next registry write, forcing that write to conflict.
pub struct Contended {
    pub memory: Arc<MemoryBackend>,
    queued: Mutex<VecDeque<RegistryChange>>,
}

impl Contended {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            memory: Arc::new(MemoryBackend::new()),
            queued: Mutex::new(VecDeque::new()),
        })
    }

    pub fn before_next_write(&self, change: impl FnOnce(&mut PackRegistry) + Send + 'static) {
        self.queued.lock().push_back(Box::new(change));
    }
}

impl StorageBackend for Contended {
    fn read(&self, path: &str) -> packs::Result<StoredDocument> {
        self.memory.read(path)
    }

    fn write(&self, path: &str, document: &Value, expected_version: u64) -> packs::Result<u64> {
        let change = self.queued.lock().pop_front();
        if let Some(change) = change {
            let current = self.memory.read(path)?;
            let mut registry: PackRegistry = current
                .document
                .map(|doc| serde_json::from_value(doc).expect("decode registry"))
                .unwrap_or_default();
            change(&mut registry);
            let competing = serde_json::to_value(&registry).expect("encode registry");
            self.memory.write(path, &competing, current.version)?;
        }
        self.memory.write(path, document, expected_version)
    }
}

/// A local fetcher that counts how often it was asked to fetch.
#[derive(Default)]
pub struct CountingFetcher {
    fetches: AtomicUsize,
}

impl CountingFetcher {
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Fetcher for CountingFetcher {
    fn fetch(&self, repo: &str, reference: Option<&str>) -> packs::Result<Staging> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        LocalFetcher.fetch(repo, reference)
    }
}
