//! Flat key/value cache for paginated upstream data.
//!
//! Entries are addressed by `(key, namespace)` and hold arbitrary JSON.
//! There is no TTL and no eviction: presence alone gates reuse, and
//! invalidation means deleting files by hand.
//!
//! Two backends implement [`CacheStore`]:
//! - **[`FileCache`]**: one JSON file per entry under `<root>/<namespace>/<key>.json`.
//! - **[`MemoryCache`]**: a `HashMap` behind a `RwLock`, for tests.
//!
//! Reads never fail the caller. Any I/O or parse problem is reported as a
//! [`CacheReadFailure`], logged, and collapsed into a miss at the
//! [`CacheStore::get`] boundary so the caller simply refetches.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tracing::debug;

use crate::error::Result;

/// Why a cache entry could not be read back.
#[derive(Debug, thiserror::Error)]
pub enum CacheReadFailure {
    #[error("cache file unreadable: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Keyed get/put over `(key, namespace)`.
pub trait CacheStore: Send + Sync {
    /// Returns the stored value, or `None` when absent or unreadable.
    fn get(&self, key: &str, namespace: &str) -> Option<Value>;

    /// Stores `value`, overwriting any previous entry (last writer wins).
    fn put(&self, key: &str, namespace: &str, value: &Value) -> Result<()>;
}

/// Whether a cached value is worth reusing. Empty lists, empty objects,
/// empty strings, `null`, `false`, and zero all count as a miss.
pub fn is_usable(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

// ============ File backend ============

/// Filesystem-backed cache rooted at a directory.
///
/// Namespace folders are created lazily on first write. Writes go to a
/// temporary sibling file and are renamed into place, so concurrent
/// writers never leave a torn file behind.
#[derive(Debug, Clone)]
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_path(&self, key: &str, namespace: &str) -> PathBuf {
        self.root.join(namespace).join(format!("{}.json", key))
    }

    fn read_entry(&self, path: &Path) -> std::result::Result<Option<Value>, CacheReadFailure> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }
}

impl CacheStore for FileCache {
    fn get(&self, key: &str, namespace: &str) -> Option<Value> {
        let path = self.entry_path(key, namespace);
        match self.read_entry(&path) {
            Ok(value) => value,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "ignoring unreadable cache entry");
                None
            }
        }
    }

    fn put(&self, key: &str, namespace: &str, value: &Value) -> Result<()> {
        let path = self.entry_path(key, namespace);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let tmp = path.with_extension(format!("json.{}.{}.tmp", std::process::id(), nanos));

        fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

// ============ In-memory backend ============

/// In-memory cache for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<(String, String), Value>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str, namespace: &str) -> Option<Value> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&(namespace.to_string(), key.to_string()))
            .cloned()
    }

    fn put(&self, key: &str, namespace: &str, value: &Value) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert((namespace.to_string(), key.to_string()), value.clone());
        Ok(())
    }
}
