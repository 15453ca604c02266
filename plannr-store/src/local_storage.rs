//! Key/value stores mirroring browser local storage.
//!
//! [`LocalStorage`] keeps the whole map in one JSON file and rewrites it on
//! every mutation through a temp file + rename, so a crash never leaves a
//! half-written collection behind. [`MemoryStorage`] is the ephemeral
//! variant used by tests and private sessions.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use plannr_core::repository::{KeyValueStore, StorageError};
use tracing::{debug, warn};

pub struct LocalStorage {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl LocalStorage {
    /// Open (or lazily create) the store at `path`. An unreadable file is
    /// moved to `*.corrupt` and the store starts empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    let aside = path.with_extension("corrupt");
                    warn!(path = %path.display(), moved_to = %aside.display(), error = %e, "Unreadable local storage file, starting empty");
                    if let Err(e) = std::fs::rename(&path, &aside) {
                        warn!(error = %e, "Failed to move unreadable local storage aside");
                    }
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StorageError::Io(e.to_string())),
        };

        debug!(path = %path.display(), keys = entries.len(), "Local storage opened");
        Ok(Self { path, entries: Mutex::new(entries) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StorageError::Io(e.to_string()))?;
            }
        }

        let raw = serde_json::to_string_pretty(entries).map_err(|e| StorageError::Io(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, raw).map_err(|e| StorageError::Io(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "Failed to replace local storage file");
            StorageError::Io(e.to_string())
        })
    }

    /// Apply `mutate` to a copy; the in-memory map only changes once the file write succeeded.
    fn mutate(&self, mutate: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = entries.clone();
        mutate(&mut next);
        self.flush(&next)?;
        *entries = next;
        Ok(())
    }
}

impl KeyValueStore for LocalStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.mutate(|entries| {
            entries.remove(key);
        })
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).remove(key);
        Ok(())
    }
}
