//! Local filesystem storage backend

use crate::{Result, Storage, StorageError};
use chrono::{DateTime, Utc};
use glob::{MatchOptions, Pattern};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Objects stored as files under a root directory.
///
/// Storage paths are interpreted relative to the root; a leading `/` is
/// ignored, so `/cache/a` and `cache/a` name the same file. Writes go to a
/// temporary sibling and are renamed into place, which makes each object
/// write atomic.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    // Hides in-flight temporary files from listings
    require_literal_leading_dot: true,
};

impl LocalStorage {
    /// Create a backend rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of this backend
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let relative = path.trim_start_matches('/');
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }

    fn to_storage_path(&self, file: &Path, absolute: bool) -> Option<String> {
        let rel = file.strip_prefix(&self.root).ok()?;
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Some(if absolute { format!("/{rel}") } else { rel })
    }
}

impl Storage for LocalStorage {
    fn protocol(&self) -> &str {
        "file"
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let file = self.resolve(path);
        tracing::debug!(target: "recall::storage", "read file://{}", file.display());
        fs::read(&file).map_err(|e| StorageError::io(e, path, "read"))
    }

    fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let file = self.resolve(path);
        tracing::debug!(
            target: "recall::storage",
            bytes = data.len(),
            "write file://{}",
            file.display()
        );
        let dir = file.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir).map_err(|e| StorageError::io(e, path, "create_dir_all"))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| StorageError::io(e, path, "create"))?;
        tmp.write_all(data)
            .map_err(|e| StorageError::io(e, path, "write"))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StorageError::io(e, path, "sync"))?;
        tmp.persist(&file)
            .map_err(|e| StorageError::io(e.error, path, "rename"))?;
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.resolve(path).exists())
    }

    fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let absolute = pattern.starts_with('/');
        let relative = pattern.trim_start_matches('/');
        let full = format!(
            "{}/{}",
            Pattern::escape(&self.root.to_string_lossy()),
            relative
        );
        let entries = glob::glob_with(&full, MATCH_OPTIONS)
            .map_err(|e| StorageError::pattern(pattern, e.msg))?;

        let mut paths = Vec::new();
        for entry in entries {
            let file = entry.map_err(|e| {
                let path = e.path().display().to_string();
                StorageError::io(e.into_error(), path, "glob")
            })?;
            if !file.is_file() {
                continue;
            }
            if let Some(p) = self.to_storage_path(&file, absolute) {
                paths.push(p);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn mkdir(&self, path: &str) -> Result<()> {
        let dir = self.resolve(path);
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(e, path, "create_dir_all"))
    }

    fn remove(&self, path: &str) -> Result<()> {
        let file = self.resolve(path);
        tracing::debug!(target: "recall::storage", "remove file://{}", file.display());
        fs::remove_file(&file).map_err(|e| StorageError::io(e, path, "remove_file"))
    }

    fn modified(&self, path: &str) -> Result<DateTime<Utc>> {
        let file = self.resolve(path);
        let metadata = fs::metadata(&file).map_err(|e| StorageError::io(e, path, "metadata"))?;
        let modified = metadata
            .modified()
            .map_err(|e| StorageError::io(e, path, "modified"))?;
        Ok(DateTime::<Utc>::from(modified))
    }
}
