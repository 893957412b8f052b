//! Error types for the storage crate

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Error type for storage operations
#[derive(Error, Debug, Diagnostic)]
pub enum StorageError {
    /// The requested object does not exist
    #[error("Object not found: {path}")]
    #[diagnostic(
        code(recall::storage::not_found),
        help("The object may have been removed by another process")
    )]
    NotFound {
        /// Path of the missing object
        path: String,
    },

    /// I/O error from the underlying medium
    #[error("I/O {operation} failed: {path}")]
    #[diagnostic(
        code(recall::storage::io),
        help("Check file permissions and ensure the path exists")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error
        path: String,
        /// Operation that failed (e.g., "read", "write", "mkdir")
        operation: String,
    },

    /// Invalid glob pattern
    #[error("Invalid glob pattern '{pattern}': {message}")]
    #[diagnostic(code(recall::storage::pattern))]
    Pattern {
        /// The offending pattern
        pattern: String,
        /// Parser message
        message: String,
    },
}

impl StorageError {
    /// Create a not found error
    #[must_use]
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create an I/O error with path context
    ///
    /// `NotFound` I/O errors are mapped to [`StorageError::NotFound`] so callers
    /// see the same variant regardless of backend.
    #[must_use]
    pub fn io(source: std::io::Error, path: impl Into<String>, operation: impl Into<String>) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            return Self::NotFound { path };
        }
        Self::Io {
            source,
            path,
            operation: operation.into(),
        }
    }

    /// Create a pattern error
    #[must_use]
    pub fn pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Whether this error reports a missing object
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;
