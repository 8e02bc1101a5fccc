//! Persistence collaborators for the environment registry
//!
//! Saves are synchronous: a registry mutation returns only after the full
//! environment set has been written.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use tracing::{debug, warn};

use crate::environment::Environment;
use crate::error::StoreError;

/// Storage backend for the full environment set
pub trait EnvironmentStore: Send + Sync {
    /// Load stored environments; `None` when nothing has been stored yet
    fn load_environments(&self) -> Result<Option<Vec<Environment>>, StoreError>;

    /// Replace the stored set with `environments`
    fn save_environments(&self, environments: &[Environment]) -> Result<(), StoreError>;
}

/// Environment set stored as a pretty-printed JSON array
///
/// Writes go to a sibling temp file which is renamed over the target, so a
/// reader never observes a half-written file. An existing file that does not
/// parse is moved to `<file>.bak` (then `.bak.1`, ...) before it is replaced.
/// Callers that load, modify and save across processes hold [`StoreLock`]
/// for the whole cycle.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

/// Exclusive hold on `<file>.lock`, released on drop
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        debug!(path = ?self.path, "StoreLock::drop: releasing");
        let _ = FileExt::unlock(&self.file);
    }
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        debug!(?path, "JsonFileStore::new: called");
        Self { path }
    }

    /// Path of the environments file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until this process holds the exclusive lock for the file
    ///
    /// Hold the returned guard from before `load_environments` until after
    /// the last `save_environments` so concurrent writers cannot drop each
    /// other's changes.
    pub fn lock(&self) -> Result<StoreLock, StoreError> {
        let lock_path = self.sibling(".lock");
        debug!(path = ?lock_path, "JsonFileStore::lock: called");
        if let Some(parent) = lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        file.lock_exclusive().map_err(|source| StoreError::Lock {
            path: lock_path.clone(),
            source,
        })?;
        Ok(StoreLock { file, path: lock_path })
    }

    /// Move an existing file that does not parse out of the way
    ///
    /// Returns where it went, or `None` when there was nothing to preserve.
    fn preserve_unreadable(&self) -> Result<Option<PathBuf>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() || serde_json::from_str::<Vec<Environment>>(&content).is_ok() {
            return Ok(None);
        }

        let mut backup = self.sibling(".bak");
        let mut n = 1;
        while backup.exists() {
            backup = self.sibling(&format!(".bak.{}", n));
            n += 1;
        }
        fs::rename(&self.path, &backup)?;
        warn!(path = ?self.path, backup = ?backup, "Moved unreadable environments file aside");
        Ok(Some(backup))
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(suffix);
        self.path.with_file_name(name)
    }
}

impl EnvironmentStore for JsonFileStore {
    fn load_environments(&self) -> Result<Option<Vec<Environment>>, StoreError> {
        debug!(path = ?self.path, "JsonFileStore::load_environments: called");
        if !self.path.exists() {
            debug!("JsonFileStore::load_environments: no file yet");
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            debug!("JsonFileStore::load_environments: empty file");
            return Ok(None);
        }

        let environments: Vec<Environment> = serde_json::from_str(&content)?;
        debug!(count = environments.len(), "JsonFileStore::load_environments: loaded");
        Ok(Some(environments))
    }

    fn save_environments(&self, environments: &[Environment]) -> Result<(), StoreError> {
        debug!(path = ?self.path, count = environments.len(), "JsonFileStore::save_environments: called");
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        self.preserve_unreadable()?;

        let tmp_path = self.sibling(".tmp");
        let content = serde_json::to_string_pretty(environments)?;
        fs::write(&tmp_path, content + "\n")?;
        fs::rename(&tmp_path, &self.path)?;

        debug!("JsonFileStore::save_environments: saved");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    environments: Option<Vec<Environment>>,
    save_count: usize,
    fail_loads: bool,
    fail_saves: bool,
}

/// In-process store, used for tests and for embedding without a filesystem
///
/// Failure injection (`set_fail_loads`, `set_fail_saves`) exercises the
/// registry's bootstrap and rollback paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `environments`
    pub fn with_environments(environments: Vec<Environment>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                environments: Some(environments),
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Environments from the most recent save (or the initial set)
    pub fn saved(&self) -> Option<Vec<Environment>> {
        self.state().environments.clone()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.state().save_count
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.state().fail_loads = fail;
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.state().fail_saves = fail;
    }
}

impl EnvironmentStore for MemoryStore {
    fn load_environments(&self) -> Result<Option<Vec<Environment>>, StoreError> {
        let state = self.state();
        if state.fail_loads {
            return Err(StoreError::Unavailable("memory store load failure".to_string()));
        }
        Ok(state.environments.clone())
    }

    fn save_environments(&self, environments: &[Environment]) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.fail_saves {
            return Err(StoreError::Unavailable("memory store save failure".to_string()));
        }
        state.environments = Some(environments.to_vec());
        state.save_count += 1;
        Ok(())
    }
}
