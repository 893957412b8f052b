//! Memoization of function results over a pluggable byte store
//!
//! This crate provides the caching engine used by recall:
//! - Deterministic cache keys derived from bound call arguments
//! - Composable validity checks (existence, TTL, custom predicates)
//! - Input/output separation with overwrite or append-snapshot expiry
//! - Cached wrappers for ordinary and future-returning functions
//!
//! # Overview
//!
//! A [`CacheConfig`] names a [`Storage`](recall_storage::Storage) capability
//! and how entries are encoded, located and validated. Wrapping a function
//! in a [`CachedFn`] (or [`AsyncCachedFn`]) with its [`TargetId`] and
//! declared [`Signature`] yields a callable that returns stored results for
//! equivalent arguments instead of recomputing them.
//!
//! # Storage layout
//!
//! ```text
//! <prefix>/<module.name>/<key>                  output entry
//! <prefix>/<module.name>/<key>.inputs           input record
//! <prefix>/<module.name>/<key>-<epoch_micros>   snapshot (append mode)
//! ```
//!
//! Keys are the SHA-256 hex digest of the canonical JSON of the bound
//! arguments, so `f(1, 2)` and `f(x=1, y=2)` share an entry.

mod cached;
mod codec;
mod config;
mod error;
mod events;
mod key;
mod path;
mod signature;
pub mod store;
mod validators;

// Re-export error types at crate root
pub use error::{BoxError, Error, Result};

// Re-export main types
pub use cached::{AsyncCachedFn, CachedFn, Introspect, Lookup};
pub use codec::{Codec, FnCodec, JsonCodec};
pub use config::{
    CacheConfig, CacheConfigBuilder, CacheSettings, ENV_EXPIRY_MODE, ENV_PREFIX, ENV_TTL,
    ExpiryMode, ResultValidator, TtlSetting,
};
pub use key::{CacheKey, key_for_arguments, tokenize};
pub use path::{PathFn, PathResolver, TargetId};
pub use signature::{BoundArguments, CallArgs, CanonicalArguments, Signature};
pub use store::{Category, Store};
pub use validators::{Exists, FnValidator, Ttl, TtlValidator, Validator, ValidatorChain};
