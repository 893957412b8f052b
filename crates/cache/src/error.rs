//! Error types for the cache crate

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use recall_storage::StorageError;
use thiserror::Error;

/// Boxed error used for causes raised by user-supplied predicates
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for cache operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Failure reported by the storage capability
    #[error(transparent)]
    #[diagnostic(transparent)]
    Storage(#[from] StorageError),

    /// Encoding or decoding through a codec failed
    #[error("{codec} codec failed: {message}")]
    #[diagnostic(code(recall::cache::codec))]
    Codec {
        /// Name of the codec that failed
        codec: String,
        /// Error message from the codec
        message: String,
    },

    /// Call arguments could not be bound or a lookup was malformed
    #[error("Invalid argument: {message}")]
    #[diagnostic(
        code(recall::cache::invalid_argument),
        help("Check the call against the declared signature")
    )]
    InvalidArgument {
        /// Error message describing the problem
        message: String,
    },

    /// Configuration or setup error
    #[error("Cache configuration error: {message}")]
    #[diagnostic(code(recall::cache::config))]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// A computed result was rejected by the configured result validator
    #[error("Result validation failed: {message}")]
    #[diagnostic(
        code(recall::cache::validation),
        help("The result was not cached; the next identical call recomputes it")
    )]
    Validation {
        /// Error message describing the rejection
        message: String,
        /// Cause raised by the validator, if any
        #[source]
        source: Option<BoxError>,
    },

    /// A storage phase running on the blocking pool did not complete
    #[error("Blocking storage task failed: {message}")]
    #[diagnostic(code(recall::cache::task))]
    Task {
        /// Error message from the runtime
        message: String,
    },
}

impl Error {
    /// Create a codec error
    #[must_use]
    pub fn codec(codec: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Codec {
            codec: codec.into(),
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: msg.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create a validation error without an underlying cause
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a validation error wrapping the validator's cause
    #[must_use]
    pub fn validation_caused_by(msg: impl Into<String>, source: BoxError) -> Self {
        Self::Validation {
            message: msg.into(),
            source: Some(source),
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task {
            message: err.to_string(),
        }
    }
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, Error>;
