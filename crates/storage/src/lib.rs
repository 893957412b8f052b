//! Byte-object storage capability for recall
//!
//! The cache engine never touches a medium directly. It reads and writes
//! through the [`Storage`] trait, which models a flat namespace of
//! `/`-separated object paths:
//! - whole-object reads and writes (a write is atomic per object)
//! - existence checks, glob listing and removal
//! - directory creation
//! - modification times for time-to-live checks
//!
//! Two reference backends ship with the crate:
//! - [`MemoryStorage`]: process-local, shared between clones
//! - [`LocalStorage`]: files under a root directory on local disk

mod error;
mod local;
mod memory;

pub use error::{Result, StorageError};
pub use local::LocalStorage;
pub use memory::MemoryStorage;

use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// Capability over a byte-object store.
///
/// Paths are `/`-separated strings. Implementations decide how a path maps
/// onto their medium; callers only rely on the same path naming the same
/// object across calls.
pub trait Storage: Send + Sync + Debug {
    /// Short scheme label used in log lines (e.g. `"memory"`, `"file"`).
    fn protocol(&self) -> &str;

    /// Read a whole object.
    fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Create or overwrite an object.
    fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Check whether an object (or directory) exists at `path`.
    fn exists(&self, path: &str) -> Result<bool>;

    /// List object paths matching a glob pattern, sorted.
    ///
    /// `*` and `?` never match the `/` separator.
    fn glob(&self, pattern: &str) -> Result<Vec<String>>;

    /// Create a directory and any missing parents. Idempotent.
    fn mkdir(&self, path: &str) -> Result<()>;

    /// Remove an object.
    fn remove(&self, path: &str) -> Result<()>;

    /// Last modification time of an object.
    fn modified(&self, path: &str) -> Result<DateTime<Utc>>;
}

/// Parent of a `/`-separated path, if it has one.
///
/// ```
/// assert_eq!(recall_storage::parent("/a/b/c"), Some("/a/b"));
/// assert_eq!(recall_storage::parent("/a"), Some("/"));
/// assert_eq!(recall_storage::parent("a"), None);
/// ```
#[must_use]
pub fn parent(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&trimmed[..idx]),
        None => None,
    }
}

/// Final component of a `/`-separated path.
///
/// ```
/// assert_eq!(recall_storage::file_name("/a/b/c.inputs"), "c.inputs");
/// assert_eq!(recall_storage::file_name("c"), "c");
/// ```
#[must_use]
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Escape glob metacharacters so `path` matches only itself.
///
/// Use this for the literal part of a pattern passed to [`Storage::glob`].
///
/// ```
/// assert_eq!(recall_storage::escape_pattern("/data/[v1]"), "/data/[[]v1[]]");
/// ```
#[must_use]
pub fn escape_pattern(path: &str) -> String {
    glob::Pattern::escape(path)
}
