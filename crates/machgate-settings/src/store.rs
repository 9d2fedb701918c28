//! Settings persistence
//!
//! A `ConfigStore` backed by a single JSON document, plus an in-memory
//! store for tests. The file store keeps the whole document cached and
//! rewrites it atomically (temp file + rename) on every `set_u32`, so a
//! crash mid-write never leaves a truncated document behind.

use machgate_core::{ConfigStore, StoreError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the settings document inside the config directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// Directory name under the platform config root.
const APP_DIR: &str = "machgate";

/// File-backed configuration store.
///
/// Values are held in memory and flushed to disk on every write; reads
/// never touch the filesystem after `open`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, u32>>,
}

impl FileStore {
    /// Open the store at the platform default location
    /// (e.g. `~/.config/machgate/settings.json` on Linux), creating the
    /// directory if needed.
    pub fn open_default() -> Result<Self, StoreError> {
        let dir = dirs::config_dir()
            .ok_or_else(|| StoreError::Load("no platform config directory".to_string()))?
            .join(APP_DIR);
        fs::create_dir_all(&dir)?;
        Self::open(dir.join(SETTINGS_FILE))
    }

    /// Open the store at an explicit path. A missing file is treated as an
    /// empty document.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = if path.exists() {
            let raw = fs::read(&path)?;
            serde_json::from_slice(&raw).map_err(|e| {
                StoreError::Load(format!("{} is not a valid settings document: {}", path.display(), e))
            })?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, u32>) -> Result<(), StoreError> {
        let raw = serde_json::to_vec_pretty(values)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).map_err(|e| StoreError::Save(format!("{}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| StoreError::Save(format!("{}: {}", self.path.display(), e)))?;
        Ok(())
    }
}

impl ConfigStore for FileStore {
    fn get_u32(&self, key: &str) -> Option<u32> {
        self.values.lock().get(key).copied()
    }

    fn set_u32(&self, key: &str, value: u32) -> Result<(), StoreError> {
        let mut values = self.values.lock();
        values.insert(key.to_string(), value);
        self.persist(&values)?;
        tracing::debug!(key, value, "setting persisted");
        Ok(())
    }
}

/// In-memory configuration store for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, u32>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryStore {
    fn get_u32(&self, key: &str) -> Option<u32> {
        self.values.lock().get(key).copied()
    }

    fn set_u32(&self, key: &str, value: u32) -> Result<(), StoreError> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }
}
