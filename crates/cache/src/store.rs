//! Read/write/list/remove over the storage capability
//!
//! ## Layout
//!
//! ```text
//! <dir>/<key>                  output entry
//! <dir>/<key>.inputs           input record (canonical arguments)
//! <dir>/<key>-<epoch_micros>   snapshot of an output (append mode only)
//! ```
//!
//! `<dir>` is the resolved path of the cached function. The `.exc` suffix is
//! reserved for an exception marker and is never written; failed calls are
//! not cached.

use crate::codec::Codec;
use crate::config::CacheConfig;
use crate::key::{CacheKey, tokenize};
use crate::path::join;
use crate::signature::CanonicalArguments;
use crate::Result;
use chrono::Utc;
use parking_lot::Mutex;
use recall_storage::{Storage, escape_pattern, file_name};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Suffix of input records
pub const INPUTS_SUFFIX: &str = ".inputs";

/// Reserved suffix for a future exception marker
pub const EXCEPTION_SUFFIX: &str = ".exc";

/// Which half of the cache a listing or removal addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Input records (`<key>.inputs`)
    Inputs,
    /// Output entries (`<key>`)
    Outputs,
}

impl Category {
    const fn suffix(self) -> &'static str {
        match self {
            Self::Inputs => INPUTS_SUFFIX,
            Self::Outputs => "",
        }
    }
}

/// Path of the entry for `key` under `dir`
#[must_use]
pub fn entry_path(dir: &str, key: &CacheKey) -> String {
    join(dir, key.as_hex())
}

/// Path of the input record belonging to an entry path
#[must_use]
pub fn input_path(entry_path: &str) -> String {
    format!("{entry_path}{INPUTS_SUFFIX}")
}

/// Whether a path names an input record
#[must_use]
pub fn is_input_path(path: &str) -> bool {
    path.ends_with(INPUTS_SUFFIX)
}

/// Whether a file name is an append-mode snapshot (`<key>-<digits>`)
#[must_use]
pub fn is_snapshot_name(name: &str) -> bool {
    name.rsplit_once('-')
        .is_some_and(|(_, ts)| !ts.is_empty() && ts.bytes().all(|b| b.is_ascii_digit()))
}

fn is_output_name(name: &str) -> bool {
    !(name.ends_with(INPUTS_SUFFIX) || name.ends_with(EXCEPTION_SUFFIX) || is_snapshot_name(name))
}

/// Storage operations for one cache configuration.
///
/// Clones share the configuration and the set of directories already known
/// to exist. That set only saves `exists`/`mkdir` round trips; a directory
/// deleted externally after being recorded is not noticed.
pub struct Store<R> {
    config: Arc<CacheConfig<R>>,
    known_dirs: Arc<Mutex<HashSet<String>>>,
}

impl<R> Clone for Store<R> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            known_dirs: Arc::clone(&self.known_dirs),
        }
    }
}

impl<R> fmt::Debug for Store<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("known_dirs", &self.known_dirs.lock().len())
            .finish()
    }
}

impl<R> Store<R> {
    /// Create a store over `config`
    #[must_use]
    pub fn new(config: Arc<CacheConfig<R>>) -> Self {
        Self {
            config,
            known_dirs: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Owning configuration
    #[must_use]
    pub const fn config(&self) -> &Arc<CacheConfig<R>> {
        &self.config
    }

    /// Storage capability
    #[must_use]
    pub fn storage(&self) -> &dyn Storage {
        self.config.storage().as_ref()
    }

    fn ensure_parent(&self, path: &str) -> Result<()> {
        let Some(parent) = recall_storage::parent(path) else {
            return Ok(());
        };
        if self.known_dirs.lock().contains(parent) {
            return Ok(());
        }
        if !self.storage().exists(parent)? {
            self.storage().mkdir(parent)?;
        }
        self.known_dirs.lock().insert(parent.to_string());
        Ok(())
    }

    /// Write raw bytes at `path`.
    ///
    /// In append mode with a non-zero TTL, output paths first get a timestamped
    /// snapshot copy.
    pub fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        self.ensure_parent(path)?;

        if self.config.writes_snapshots() && !is_input_path(path) {
            let snapshot = format!("{path}-{}", Utc::now().timestamp_micros());
            self.storage().write(&snapshot, data)?;
        }

        self.storage().write(path, data)?;
        Ok(())
    }

    /// Read raw bytes at `path`
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(self.storage().read(path)?)
    }

    /// Whether an object exists at `path`
    pub fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.storage().exists(path)?)
    }

    /// Persist the input record of the entry at `entry_path`
    pub fn write_input(&self, entry_path: &str, inputs: &CanonicalArguments) -> Result<()> {
        self.write_input_with(entry_path, inputs, self.config.input_codec().as_ref())
    }

    /// Persist an input record with an explicit codec
    pub fn write_input_with(
        &self,
        entry_path: &str,
        inputs: &CanonicalArguments,
        codec: &dyn Codec<CanonicalArguments>,
    ) -> Result<()> {
        let (_, bytes) = tokenize(inputs, codec)?;
        self.write(&input_path(entry_path), &bytes)
    }

    /// Load the input record of the entry at `entry_path`
    pub fn read_input(&self, entry_path: &str) -> Result<CanonicalArguments> {
        self.read_input_with(entry_path, self.config.input_codec().as_ref())
    }

    /// Load an input record with an explicit codec
    pub fn read_input_with(
        &self,
        entry_path: &str,
        codec: &dyn Codec<CanonicalArguments>,
    ) -> Result<CanonicalArguments> {
        let bytes = self.read(&input_path(entry_path))?;
        codec.decode(&bytes)
    }

    /// Persist an output entry, returning the number of bytes written
    pub fn write_output(&self, entry_path: &str, output: &R) -> Result<usize> {
        self.write_output_with(entry_path, output, self.config.output_codec().as_ref())
    }

    /// Persist an output entry with an explicit codec
    pub fn write_output_with(
        &self,
        entry_path: &str,
        output: &R,
        codec: &dyn Codec<R>,
    ) -> Result<usize> {
        let (_, bytes) = tokenize(output, codec)?;
        self.write(entry_path, &bytes)?;
        Ok(bytes.len())
    }

    /// Load an output entry
    pub fn read_output(&self, entry_path: &str) -> Result<R> {
        self.read_output_with(entry_path, self.config.output_codec().as_ref())
    }

    /// Load an output entry with an explicit codec
    pub fn read_output_with(&self, entry_path: &str, codec: &dyn Codec<R>) -> Result<R> {
        let bytes = self.read(entry_path)?;
        codec.decode(&bytes)
    }

    /// Whether the entry at `entry_path` passes the validator chain
    pub fn valid(&self, entry_path: &str) -> bool {
        self.config.validators().valid(self.storage(), entry_path)
    }

    /// Iterate the keys (or full paths) of one category under `dir`.
    ///
    /// Snapshots are never included.
    pub fn iter(
        &self,
        dir: &str,
        category: Category,
        full_paths: bool,
    ) -> Result<impl Iterator<Item = String> + use<R>> {
        let pattern = join(&escape_pattern(dir), &format!("*{}", category.suffix()));
        let matches = self.storage().glob(&pattern)?;
        Ok(matches.into_iter().filter_map(move |path| {
            let name = file_name(&path);
            let keep = match category {
                Category::Inputs => !is_snapshot_name(name),
                Category::Outputs => is_output_name(name),
            };
            if !keep {
                return None;
            }
            if full_paths {
                return Some(path);
            }
            let key = name.strip_suffix(category.suffix()).unwrap_or(name);
            Some(key.to_string())
        }))
    }

    /// Collect the keys (or full paths) of one category under `dir`
    pub fn list(&self, dir: &str, category: Category, full_paths: bool) -> Result<Vec<String>> {
        Ok(self.iter(dir, category, full_paths)?.collect())
    }

    /// Full paths of every append-mode snapshot under `dir`
    pub fn list_snapshots(&self, dir: &str) -> Result<Vec<String>> {
        let matches = self.storage().glob(&join(&escape_pattern(dir), "*-*"))?;
        Ok(matches
            .into_iter()
            .filter(|path| is_snapshot_name(file_name(path)))
            .collect())
    }

    /// Remove the object at `path`; returns whether anything was removed
    pub fn remove(&self, path: &str) -> Result<bool> {
        if !self.storage().exists(path)? {
            return Ok(false);
        }
        self.storage().remove(path)?;
        Ok(true)
    }

    /// Remove every object of one category under `dir`; returns the count
    pub fn remove_all(&self, dir: &str, category: Category) -> Result<usize> {
        let mut removed = 0;
        for path in self.list(dir, category, true)? {
            if self.remove(&path)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExpiryMode;
    use recall_storage::MemoryStorage;
    use serde_json::json;
    use std::collections::BTreeMap;

    const DIR: &str = "/cache/math.add";

    fn store(memory: &MemoryStorage) -> Store<i64> {
        let config = CacheConfig::<i64>::builder(Arc::new(memory.clone()))
            .build()
            .unwrap();
        Store::new(Arc::new(config))
    }

    fn append_store(memory: &MemoryStorage) -> Store<i64> {
        let config = CacheConfig::<i64>::builder(Arc::new(memory.clone()))
            .ttl(60_u64)
            .expiry_mode(ExpiryMode::Append)
            .build()
            .unwrap();
        Store::new(Arc::new(config))
    }

    fn key(n: u8) -> CacheKey {
        CacheKey::from_bytes(&[n])
    }

    fn inputs() -> CanonicalArguments {
        BTreeMap::from([("x".to_string(), json!(2)), ("y".to_string(), json!(3))]).into()
    }

    #[test]
    fn test_snapshot_name_detection() {
        assert!(is_snapshot_name("abc-1718000000000000"));
        assert!(!is_snapshot_name("abc"));
        assert!(!is_snapshot_name("abc-"));
        assert!(!is_snapshot_name("abc-12x"));
        assert!(!is_snapshot_name("abc.inputs"));
    }

    #[test]
    fn test_write_creates_parent_once() {
        let memory = MemoryStorage::new();
        let store = store(&memory);
        store.write(&entry_path(DIR, &key(1)), b"1").unwrap();
        store.write(&entry_path(DIR, &key(2)), b"2").unwrap();
        assert!(memory.exists(DIR).unwrap());
        assert_eq!(store.known_dirs.lock().len(), 1);
    }

    #[test]
    fn test_output_roundtrip() {
        let memory = MemoryStorage::new();
        let store = store(&memory);
        let path = entry_path(DIR, &key(1));
        let written = store.write_output(&path, &5).unwrap();
        assert_eq!(written, 1);
        assert_eq!(store.read_output(&path).unwrap(), 5);
    }

    #[test]
    fn test_input_record_roundtrip() {
        let memory = MemoryStorage::new();
        let store = store(&memory);
        let path = entry_path(DIR, &key(1));
        store.write_input(&path, &inputs()).unwrap();

        assert!(memory.exists(&format!("{path}.inputs")).unwrap());
        assert!(!memory.exists(&path).unwrap());
        assert_eq!(store.read_input(&path).unwrap(), inputs());
    }

    #[test]
    fn test_listing_separates_categories() {
        let memory = MemoryStorage::new();
        let store = store(&memory);
        let k1 = entry_path(DIR, &key(1));
        let k2 = entry_path(DIR, &key(2));
        store.write_input(&k1, &inputs()).unwrap();
        store.write_output(&k1, &1).unwrap();
        store.write_input(&k2, &inputs()).unwrap();
        memory.write(&format!("{k1}.exc"), b"reserved").unwrap();

        let data = store.list(DIR, Category::Outputs, false).unwrap();
        assert_eq!(data, vec![key(1).to_string()]);

        let mut ins = store.list(DIR, Category::Inputs, false).unwrap();
        ins.sort();
        let mut expected = vec![key(1).to_string(), key(2).to_string()];
        expected.sort();
        assert_eq!(ins, expected);

        let full = store.list(DIR, Category::Outputs, true).unwrap();
        assert_eq!(full, vec![k1]);
    }

    #[test]
    fn test_append_mode_writes_snapshot_for_outputs_only() {
        let memory = MemoryStorage::new();
        let store = append_store(&memory);
        let path = entry_path(DIR, &key(1));

        store.write_input(&path, &inputs()).unwrap();
        store.write_output(&path, &1).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        store.write_output(&path, &2).unwrap();

        assert_eq!(store.list_snapshots(DIR).unwrap().len(), 2);
        assert_eq!(store.list(DIR, Category::Outputs, false).unwrap().len(), 1);
        assert_eq!(store.list(DIR, Category::Inputs, false).unwrap().len(), 1);
        assert_eq!(store.read_output(&path).unwrap(), 2);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let memory = MemoryStorage::new();
        let store = store(&memory);
        let path = entry_path(DIR, &key(1));
        store.write_output(&path, &1).unwrap();
        assert!(store.remove(&path).unwrap());
        assert!(!store.remove(&path).unwrap());
    }

    #[test]
    fn test_remove_all_by_category() {
        let memory = MemoryStorage::new();
        let store = store(&memory);
        for n in 0..3 {
            let path = entry_path(DIR, &key(n));
            store.write_input(&path, &inputs()).unwrap();
            store.write_output(&path, &i64::from(n)).unwrap();
        }

        assert_eq!(store.remove_all(DIR, Category::Outputs).unwrap(), 3);
        assert!(store.list(DIR, Category::Outputs, false).unwrap().is_empty());
        assert_eq!(store.list(DIR, Category::Inputs, false).unwrap().len(), 3);

        assert_eq!(store.remove_all(DIR, Category::Inputs).unwrap(), 3);
        assert!(memory.is_empty());
    }

    #[test]
    fn test_valid_uses_chain() {
        let memory = MemoryStorage::new();
        let store = store(&memory);
        let path = entry_path(DIR, &key(1));
        assert!(!store.valid(&path));
        store.write_output(&path, &1).unwrap();
        assert!(store.valid(&path));
    }
}
