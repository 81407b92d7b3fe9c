//! Durable JSON-backed cache store.

use std::path::{Path, PathBuf};

use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::CacheError;

/// The mapping held by a [`CacheStore`].
pub type CacheMap = serde_json::Map<String, Value>;

/// Shared key-value cache with explicit-save durability.
///
/// One instance is created at startup and shared by `Arc` with every
/// extension. All access goes through a single non-poisoning mutex, so a
/// callback that panics mid-update leaves the store usable.
#[derive(Debug)]
pub struct CacheStore {
    /// Backing file, `None` for a purely in-memory store.
    path: Option<PathBuf>,
    /// The mapping.
    entries: Mutex<CacheMap>,
    /// Orders concurrent saves so the file always ends up with the newest
    /// snapshot.
    save_lock: Mutex<()>,
}

impl CacheStore {
    /// Load the store from `path`.
    ///
    /// Never fails: a missing, unreadable or malformed file yields an empty
    /// mapping and the problem is reported through `tracing`.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let entries = match read_file(&path) {
            Ok(Some(entries)) => {
                info!(path = %path.display(), keys = entries.len(), "Cache loaded");
                entries
            }
            Ok(None) => {
                debug!(path = %path.display(), "Cache file absent, starting empty");
                CacheMap::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cache file unusable, starting empty");
                CacheMap::new()
            }
        };

        Self {
            path: Some(path),
            entries: Mutex::new(entries),
            save_lock: Mutex::new(()),
        }
    }

    /// Create a store with no backing file. [`save`](Self::save) fails with
    /// [`CacheError::Detached`].
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(CacheMap::new()),
            save_lock: Mutex::new(()),
        }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns a clone of the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().get(key).cloned()
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.lock().insert(key.into(), value.into())
    }

    /// Removes `key`, returning its value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.entries.lock().remove(key)
    }

    /// Returns whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// All keys, in map order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Read-modify-write of a single key under the store lock.
    ///
    /// A missing key is presented as `Value::Null`. If `f` leaves the value
    /// as `Null` the key is removed.
    pub fn update<R>(&self, key: &str, f: impl FnOnce(&mut Value) -> R) -> R {
        let mut slot = NullPruned {
            entries: self.entries.lock(),
            key,
        };
        f(slot.entries.entry(key).or_insert(Value::Null))
    }

    /// Runs `f` with exclusive access to the whole mapping, for changes that
    /// span several keys.
    pub fn with_map<R>(&self, f: impl FnOnce(&mut CacheMap) -> R) -> R {
        f(&mut self.entries.lock())
    }

    /// Returns a copy of the whole mapping.
    pub fn snapshot(&self) -> CacheMap {
        self.entries.lock().clone()
    }

    /// Serialize the whole mapping to the backing file, replacing it.
    ///
    /// The mapping lock is held only while serializing. The bytes go to a
    /// sibling temporary file which is then renamed over the target.
    pub fn save(&self) -> Result<(), CacheError> {
        let path = self.path.as_ref().ok_or(CacheError::Detached)?;

        let _ordered = self.save_lock.lock();
        let body = {
            let entries = self.entries.lock();
            serde_json::to_vec_pretty(&*entries).map_err(CacheError::Serialize)?
        };

        write_atomically(path, &body).map_err(|source| CacheError::Write {
            path: path.clone(),
            source,
        })?;

        debug!(path = %path.display(), bytes = body.len(), "Cache saved");
        Ok(())
    }
}

/// Reads and parses the cache file. `Ok(None)` means the file does not exist.
fn read_file(path: &Path) -> Result<Option<CacheMap>, CacheError> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(CacheError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let value: Value = serde_json::from_slice(&raw).map_err(|source| CacheError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    match value {
        Value::Object(map) => Ok(Some(map)),
        _ => Err(CacheError::NotAnObject {
            path: path.to_path_buf(),
        }),
    }
}

/// Removes `key` on drop if it holds `Null`, also when `update` unwinds.
struct NullPruned<'a> {
    entries: MutexGuard<'a, CacheMap>,
    key: &'a str,
}

impl Drop for NullPruned<'_> {
    fn drop(&mut self) {
        if self.entries.get(self.key).is_some_and(Value::is_null) {
            self.entries.remove(self.key);
        }
    }
}

fn write_atomically(path: &Path, body: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "cache".into());
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, path)
}
