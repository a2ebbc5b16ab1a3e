//! Key-value persistence
//!
//! A synchronous string key-value store, the shape mobile hosts expose
//! through MMKV / SharedPreferences / NSUserDefaults. Callers never see a
//! failure: a missing key reads as `None` and deleting it again is a no-op.
//!
//! # Example
//!
//! ```ignore
//! use vitrine_platform::{KeyValueStorage, MemoryStorage};
//!
//! let storage = MemoryStorage::new();
//! storage.set("@value-sleep", "42");
//! assert_eq!(storage.get_string("@value-sleep").as_deref(), Some("42"));
//! storage.delete("@value-sleep");
//! ```

use crate::error::Result;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Synchronous string key-value store
pub trait KeyValueStorage: Send + Sync {
    /// Read the value stored under `key`
    fn get_string(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str);

    /// Remove `key`; removing a missing key does nothing
    fn delete(&self, key: &str);
}

/// In-process storage backed by a hash map
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RwLock<FxHashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_string(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    fn delete(&self, key: &str) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// Storage persisted to a JSON object file
///
/// The whole map is rewritten on every mutation. Write failures are logged
/// and kept in memory; [`FileStorage::flush`] surfaces them to callers that
/// need to know.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    // BTreeMap keeps the file diff-friendly
    values: RwLock<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open (or lazily create) the storage file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!(
            "FileStorage: opened {} with {} keys",
            path.display(),
            values.len()
        );

        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current contents to disk
    pub fn flush(&self) -> Result<()> {
        let content = {
            let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
            serde_json::to_string_pretty(&*values)?
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, content)?;
        Ok(())
    }

    fn write_through(&self) {
        if let Err(err) = self.flush() {
            tracing::warn!("FileStorage: failed to write {}: {}", self.path.display(), err);
        }
    }
}

impl KeyValueStorage for FileStorage {
    fn get_string(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        self.write_through();
    }

    fn delete(&self, key: &str) {
        let removed = self
            .values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some();
        if removed {
            self.write_through();
        }
    }
}
