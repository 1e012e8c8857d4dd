use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use tracing::warn;

use super::KeyValueStore;

/// Browser-scoped analog: a JSON map persisted on disk, surviving process
/// restarts until explicitly cleared. Holds only the rotation copy of the
/// refresh token in normal operation.
///
/// Writes go through on every mutation. A failed write is logged and the
/// in-memory view kept; storage errors never escape this component.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, loading any existing contents. A missing
    /// file is an empty store; an unreadable or corrupt file is an error so
    /// the caller can decide whether to start fresh.
    pub fn open(path: PathBuf) -> Result<Self> {
        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read credential store: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse credential store: {}", path.display()))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, entries: &HashMap<String, String>) {
        let result = (|| -> Result<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let contents = serde_json::to_string_pretty(entries)?;
            std::fs::write(&self.path, contents)?;
            Ok(())
        })();

        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "Failed to persist credential store");
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries();
        if entries.remove(key).is_some() {
            self.persist(&entries);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("store.json");

        let store = FileStore::open(path.clone()).expect("open");
        store.set("refreshToken", "R1");
        drop(store);

        let store = FileStore::open(path).expect("reopen");
        assert_eq!(store.get("refreshToken").as_deref(), Some("R1"));
    }

    #[test]
    fn test_remove_persists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("store.json");

        let store = FileStore::open(path.clone()).expect("open");
        store.set("refreshToken", "R1");
        store.remove("refreshToken");
        drop(store);

        let store = FileStore::open(path).expect("reopen");
        assert_eq!(store.get("refreshToken"), None);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(dir.path().join("absent.json")).expect("open");
        assert_eq!(store.get("refreshToken"), None);
    }
}
