//! In-memory storage backend

use crate::{Result, Storage, StorageError};
use chrono::{DateTime, Utc};
use glob::{MatchOptions, Pattern};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct MemoryObject {
    data: Arc<[u8]>,
    modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryState {
    objects: BTreeMap<String, MemoryObject>,
    dirs: BTreeSet<String>,
}

/// Process-local object store.
///
/// Clones share the same underlying state, so a clone handed to a cache
/// and a clone kept by a test observe the same objects.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<RwLock<MemoryState>>,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Collapse repeated separators and drop a trailing one.
fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_sep = false;
    for c in path.chars() {
        if c == '/' {
            if prev_sep {
                continue;
            }
            prev_sep = true;
        } else {
            prev_sep = false;
        }
        out.push(c);
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

impl MemoryStorage {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects (directories excluded)
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().objects.len()
    }

    /// Whether the store holds no objects
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().objects.is_empty()
    }

    /// All object paths, sorted
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.state.read().objects.keys().cloned().collect()
    }
}

impl Storage for MemoryStorage {
    fn protocol(&self) -> &str {
        "memory"
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let path = normalize(path);
        tracing::debug!(target: "recall::storage", "read memory://{path}");
        self.state
            .read()
            .objects
            .get(&path)
            .map(|obj| obj.data.to_vec())
            .ok_or_else(|| StorageError::not_found(path))
    }

    fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let path = normalize(path);
        tracing::debug!(target: "recall::storage", bytes = data.len(), "write memory://{path}");
        let object = MemoryObject {
            data: Arc::from(data),
            modified: Utc::now(),
        };
        self.state.write().objects.insert(path, object);
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool> {
        let path = normalize(path);
        let state = self.state.read();
        if state.objects.contains_key(&path) || state.dirs.contains(&path) {
            return Ok(true);
        }
        // Writing an object implicitly materializes its parent directories.
        let prefix = if path.ends_with('/') {
            path
        } else {
            format!("{path}/")
        };
        Ok(state
            .objects
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(k, _)| k.starts_with(&prefix)))
    }

    fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let normalized = normalize(pattern);
        let matcher = Pattern::new(&normalized)
            .map_err(|e| StorageError::pattern(pattern, e.msg))?;
        Ok(self
            .state
            .read()
            .objects
            .keys()
            .filter(|k| matcher.matches_with(k, MATCH_OPTIONS))
            .cloned()
            .collect())
    }

    fn mkdir(&self, path: &str) -> Result<()> {
        let path = normalize(path);
        let mut state = self.state.write();
        let mut current = Some(path.as_str());
        while let Some(dir) = current {
            if !state.dirs.insert(dir.to_string()) {
                break;
            }
            current = crate::parent(dir);
        }
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<()> {
        let path = normalize(path);
        tracing::debug!(target: "recall::storage", "remove memory://{path}");
        match self.state.write().objects.remove(&path) {
            Some(_) => Ok(()),
            None => Err(StorageError::not_found(path)),
        }
    }

    fn modified(&self, path: &str) -> Result<DateTime<Utc>> {
        let path = normalize(path);
        self.state
            .read()
            .objects
            .get(&path)
            .map(|obj| obj.modified)
            .ok_or_else(|| StorageError::not_found(path))
    }
}
