//! Key/value persistence with a byte quota.
//!
//! Values are JSON strings.  The quota counts key and value bytes across all
//! entries; a write that would exceed it fails with
//! [`StoreError::QuotaExceeded`] and leaves the store unchanged.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store encoding failed: {0}")]
    Serde(#[from] serde_json::Error),
}

pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

fn usage(map: &BTreeMap<String, String>) -> usize {
    map.iter().map(|(k, v)| k.len() + v.len()).sum()
}

/// Usage after replacing `key` with `value`.
fn usage_with(map: &BTreeMap<String, String>, key: &str, value: &str) -> usize {
    let existing = map.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
    usage(map) - existing + key.len() + value.len()
}

fn check_quota(needed: usize, quota: Option<usize>) -> Result<(), StoreError> {
    match quota {
        Some(quota) if needed > quota => Err(StoreError::QuotaExceeded { needed, quota }),
        _ => Ok(()),
    }
}

// ── FileStore ─────────────────────────────────────────────────────────────────

/// One JSON object on disk, rewritten atomically on every change.
pub struct FileStore {
    path: PathBuf,
    quota: usize,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open (or start) the store at `path`.  An unreadable or malformed file
    /// is logged and replaced by an empty store on the next write.
    pub fn open(path: impl Into<PathBuf>, quota: usize) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("store: {} is malformed, starting empty: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!("store: cannot read {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };
        debug!("store: opened {} ({} keys)", path.display(), entries.len());
        Self {
            path,
            quota,
            entries,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        check_quota(usage_with(&self.entries, key, &value), Some(self.quota))?;
        let previous = self.entries.insert(key.to_string(), value);
        if let Err(e) = self.flush() {
            // Keep memory in step with disk.
            match previous {
                Some(v) => self.entries.insert(key.to_string(), v),
                None => self.entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

// ── MemoryStore ───────────────────────────────────────────────────────────────

/// Volatile store, used when the data directory is not writable and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            quota: Some(quota),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        check_quota(usage_with(&self.entries, key, &value), self.quota)?;
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_quota_rejects_oversized_write() {
        let mut store = MemoryStore::with_quota(16);
        store.set("k", "0123456789".into()).unwrap();
        let err = store.set("other", "0123456789".into()).unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { needed: 26, quota: 16 }));
        assert_eq!(store.get("other"), None);
        // Replacing an existing value only counts the new size.
        store.set("k", "012345678901234".into()).unwrap();
    }

    #[test]
    fn test_file_store_persists_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        {
            let mut store = FileStore::open(&path, 1024);
            store.set("a", "1".into()).unwrap();
            store.set("b", "\"two\"".into()).unwrap();
            store.remove("a").unwrap();
        }
        let store = FileStore::open(&path, 1024);
        assert_eq!(store.get("a"), None);
        assert_eq!(store.get("b").as_deref(), Some("\"two\""));
    }

    #[test]
    fn test_file_store_recovers_from_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{not json").unwrap();
        let mut store = FileStore::open(&path, 1024);
        assert_eq!(store.get("anything"), None);
        store.set("k", "v".into()).unwrap();
        assert_eq!(FileStore::open(&path, 1024).get("k").as_deref(), Some("v"));
    }

    #[test]
    fn test_file_store_quota_leaves_disk_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut store = FileStore::open(&path, 8);
        store.set("k", "small".into()).unwrap();
        assert!(store.set("k", "much too large".into()).is_err());
        assert_eq!(FileStore::open(&path, 8).get("k").as_deref(), Some("small"));
    }
}
