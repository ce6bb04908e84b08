//! Local key-value persistence used when the configuration backend is
//! unreachable.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

/// String values under string keys.
///
/// Implementations must be safe to share between tasks; calls are short and
/// synchronous.
pub trait KeyValueStore: Send + Sync {
    /// Read a value. A missing key is `Ok(None)`.
    fn get(&self, key: &str) -> io::Result<Option<String>>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> io::Result<()>;

    /// Remove a value. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// Stores each key as `<dir>/<key>.json`.
///
/// Writes go to a temporary file that is renamed over the target, so a
/// reader never observes a half-written value.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let target = self.path(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &target)
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// In-memory store, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.values.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_store_round_trips_values() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyValueStore::new(dir.path().join("state"));

        assert_eq!(store.get("metricsConfig").unwrap(), None);

        store.set("metricsConfig", "[]").unwrap();
        assert_eq!(store.get("metricsConfig").unwrap().as_deref(), Some("[]"));
        assert!(dir.path().join("state/metricsConfig.json").exists());

        store.set("metricsConfig", "[1]").unwrap();
        assert_eq!(store.get("metricsConfig").unwrap().as_deref(), Some("[1]"));
    }

    #[test]
    fn file_store_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyValueStore::new(dir.path());

        store.set("refreshInterval", "60000").unwrap();
        store.remove("refreshInterval").unwrap();
        store.remove("refreshInterval").unwrap();
        assert_eq!(store.get("refreshInterval").unwrap(), None);
    }

    #[test]
    fn memory_store_basics() {
        let store = MemoryKeyValueStore::new();
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }
}
