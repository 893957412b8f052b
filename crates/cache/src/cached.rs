//! Cached callables
//!
//! [`CachedFn`] wraps an ordinary function and [`AsyncCachedFn`] wraps a
//! future-returning one. Both follow the same call protocol:
//!
//! 1. bind the call arguments and derive the entry path and key
//! 2. if the validator chain accepts the entry, load and return it
//! 3. otherwise persist the input record
//! 4. run the target; its errors are returned untouched and nothing is cached
//! 5. run the result validator, if any; a rejected result is not cached
//! 6. persist the output entry and return the result
//!
//! Both also implement [`Introspect`], the key/list/load/remove surface.

use crate::codec::Codec;
use crate::config::CacheConfig;
use crate::events::{emit_cache_hit, emit_cache_miss, emit_cache_stored, emit_result_invalid};
use crate::key::{CacheKey, key_for_arguments};
use crate::path::TargetId;
use crate::signature::{BoundArguments, CallArgs, CanonicalArguments, Signature};
use crate::store::{Category, Store, entry_path, input_path};
use crate::{Error, Result};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// How an introspection call addresses an entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// An already computed key
    Key(CacheKey),
    /// Call arguments, bound and hashed like a real call
    Args(CallArgs),
}

impl From<CacheKey> for Lookup {
    fn from(key: CacheKey) -> Self {
        Self::Key(key)
    }
}

impl From<CallArgs> for Lookup {
    fn from(args: CallArgs) -> Self {
        Self::Args(args)
    }
}

/// A bound call, ready to be looked up.
struct Prepared {
    bound: BoundArguments,
    canonical: CanonicalArguments,
    path: String,
}

fn prepare<R>(
    config: &CacheConfig<R>,
    id: &TargetId,
    signature: &Signature,
    args: &CallArgs,
) -> Result<Prepared> {
    let bound = signature.bind(args)?;
    let canonical = bound.canonicalize(config.ignore(), config.receiver_attrs())?;
    let key = key_for_arguments(&canonical)?;
    let dir = config.path(id, Some(&bound));
    Ok(Prepared {
        path: entry_path(&dir, &key),
        bound,
        canonical,
    })
}

fn check_result<R>(config: &CacheConfig<R>, id: &TargetId, path: &str, result: &R) -> Result<()> {
    let Some(validator) = config.result_validator() else {
        return Ok(());
    };
    match validator(result) {
        Ok(true) => Ok(()),
        Ok(false) => {
            emit_result_invalid!(id, path, "validator returned false");
            Err(Error::validation(format!(
                "result of {id} was rejected by the result validator"
            )))
        }
        Err(cause) => {
            emit_result_invalid!(id, path, cause);
            Err(Error::validation_caused_by(
                format!("result validator of {id} failed"),
                cause,
            ))
        }
    }
}

/// Key computation, validity checks, listing, loading and removal for a
/// cached function.
///
/// Every method is provided on top of [`target_id`](Self::target_id),
/// [`signature`](Self::signature) and [`store`](Self::store).
pub trait Introspect<R> {
    /// Identity the entries are stored under
    fn target_id(&self) -> &TargetId;

    /// Declared parameters used to bind call arguments
    fn signature(&self) -> &Signature;

    /// Storage operations for this function
    fn store(&self) -> &Store<R>;

    /// Owning configuration
    fn config(&self) -> &Arc<CacheConfig<R>> {
        self.store().config()
    }

    /// Directory holding this function's entries.
    ///
    /// A custom path resolver receives no arguments here.
    fn path(&self) -> String {
        self.config().path(self.target_id(), None)
    }

    /// Canonical arguments of a call and their key
    fn tokenize(&self, args: &CallArgs) -> Result<(CacheKey, CanonicalArguments)> {
        let bound = self.signature().bind(args)?;
        let canonical = bound.canonicalize(self.config().ignore(), self.config().receiver_attrs())?;
        Ok((key_for_arguments(&canonical)?, canonical))
    }

    /// Key of a call
    fn key(&self, args: &CallArgs) -> Result<CacheKey> {
        self.tokenize(args).map(|(key, _)| key)
    }

    /// Entry path addressed by `lookup`
    fn entry_path(&self, lookup: impl Into<Lookup>) -> Result<String> {
        match lookup.into() {
            Lookup::Key(key) => Ok(entry_path(&self.path(), &key)),
            Lookup::Args(args) => {
                prepare(self.config(), self.target_id(), self.signature(), &args).map(|p| p.path)
            }
        }
    }

    /// Whether a call with `args` would be served from the cache
    fn is_valid(&self, args: &CallArgs) -> Result<bool> {
        let path = self.entry_path(args.clone())?;
        Ok(self.store().valid(&path))
    }

    /// Whether an input record exists
    fn has_inputs(&self, lookup: impl Into<Lookup>) -> Result<bool> {
        let path = self.entry_path(lookup)?;
        self.store().exists(&input_path(&path))
    }

    /// Whether an output entry exists
    fn has_data(&self, lookup: impl Into<Lookup>) -> Result<bool> {
        let path = self.entry_path(lookup)?;
        self.store().exists(&path)
    }

    /// Iterate the keys (or full paths) of stored input records
    fn iter_cached_inputs(&self, full_paths: bool) -> Result<impl Iterator<Item = String>> {
        self.store().iter(&self.path(), Category::Inputs, full_paths)
    }

    /// Iterate the keys (or full paths) of stored output entries
    fn iter_cached_data(&self, full_paths: bool) -> Result<impl Iterator<Item = String>> {
        self.store().iter(&self.path(), Category::Outputs, full_paths)
    }

    /// Keys of stored input records
    fn list_cached_inputs(&self) -> Result<Vec<String>> {
        self.store().list(&self.path(), Category::Inputs, false)
    }

    /// Keys of stored output entries
    fn list_cached_data(&self) -> Result<Vec<String>> {
        self.store().list(&self.path(), Category::Outputs, false)
    }

    /// Full paths of append-mode snapshots
    fn list_snapshots(&self) -> Result<Vec<String>> {
        self.store().list_snapshots(&self.path())
    }

    /// Load an input record
    fn load_cached_inputs(&self, lookup: impl Into<Lookup>) -> Result<CanonicalArguments> {
        let path = self.entry_path(lookup)?;
        self.store().read_input(&path)
    }

    /// Load an input record with an explicit codec
    fn load_cached_inputs_with(
        &self,
        lookup: impl Into<Lookup>,
        codec: &dyn Codec<CanonicalArguments>,
    ) -> Result<CanonicalArguments> {
        let path = self.entry_path(lookup)?;
        self.store().read_input_with(&path, codec)
    }

    /// Load an output entry
    fn load_cached_data(&self, lookup: impl Into<Lookup>) -> Result<R> {
        let path = self.entry_path(lookup)?;
        self.store().read_output(&path)
    }

    /// Load an output entry with an explicit codec
    fn load_cached_data_with(&self, lookup: impl Into<Lookup>, codec: &dyn Codec<R>) -> Result<R> {
        let path = self.entry_path(lookup)?;
        self.store().read_output_with(&path, codec)
    }

    /// Remove an input record; missing records are ignored
    fn remove_cached_inputs(&self, lookup: impl Into<Lookup>) -> Result<bool> {
        let path = self.entry_path(lookup)?;
        self.store().remove(&input_path(&path))
    }

    /// Remove an output entry; missing entries are ignored
    fn remove_cached_data(&self, lookup: impl Into<Lookup>) -> Result<bool> {
        let path = self.entry_path(lookup)?;
        self.store().remove(&path)
    }

    /// Remove every input record, returning how many were removed
    fn remove_all_cached_inputs(&self) -> Result<usize> {
        self.store().remove_all(&self.path(), Category::Inputs)
    }

    /// Remove every output entry, returning how many were removed
    fn remove_all_cached_data(&self) -> Result<usize> {
        self.store().remove_all(&self.path(), Category::Outputs)
    }
}

/// A function whose results are memoized.
///
/// ```
/// use recall_cache::{BoundArguments, CacheConfig, CachedFn, CallArgs, Signature, target_id};
/// use recall_storage::MemoryStorage;
/// use std::sync::Arc;
///
/// let config = CacheConfig::<i64>::builder(Arc::new(MemoryStorage::new())).build()?;
/// let add = CachedFn::new(config, target_id!(add), Signature::new(["x", "y"]), |args: &BoundArguments| {
///     Ok::<_, recall_cache::Error>(args.get_as::<i64>("x")? + args.get_as::<i64>("y")?)
/// });
/// assert_eq!(add.call(&CallArgs::new().arg(2).arg(3))?, 5);
/// # Ok::<(), recall_cache::Error>(())
/// ```
pub struct CachedFn<R, F> {
    id: TargetId,
    signature: Signature,
    store: Store<R>,
    target: F,
}

impl<R, F> CachedFn<R, F> {
    /// Wrap `target`, storing its entries under `id`
    pub fn new(
        config: impl Into<Arc<CacheConfig<R>>>,
        id: TargetId,
        signature: Signature,
        target: F,
    ) -> Self {
        Self {
            id,
            signature,
            store: Store::new(config.into()),
            target,
        }
    }

    /// The wrapped function, callable without caching
    pub const fn target(&self) -> &F {
        &self.target
    }

    /// Run the call protocol.
    ///
    /// Errors returned by the target come back unchanged; engine errors are
    /// converted into `E`.
    pub fn call<E>(&self, args: &CallArgs) -> std::result::Result<R, E>
    where
        F: Fn(&BoundArguments) -> std::result::Result<R, E>,
        E: From<Error>,
    {
        let config = self.store.config();
        let Prepared {
            bound,
            canonical,
            path,
        } = prepare(config, &self.id, &self.signature, args)?;

        if self.store.valid(&path) {
            emit_cache_hit!(self.id, path);
            return Ok(self.store.read_output(&path)?);
        }

        emit_cache_miss!(self.id, path);
        self.store.write_input(&path, &canonical)?;

        let result = (self.target)(&bound)?;
        check_result(config, &self.id, &path, &result)?;

        let bytes = self.store.write_output(&path, &result)?;
        emit_cache_stored!(self.id, path, bytes);
        Ok(result)
    }
}

impl<R, F> Introspect<R> for CachedFn<R, F> {
    fn target_id(&self) -> &TargetId {
        &self.id
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn store(&self) -> &Store<R> {
        &self.store
    }
}

impl<R, F> fmt::Debug for CachedFn<R, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedFn")
            .field("id", &self.id)
            .field("signature", &self.signature)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

/// Run a storage phase on the blocking pool.
async fn blocking<T, G>(phase: G) -> Result<T>
where
    G: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(phase).await?
}

/// A future-returning function whose results are memoized.
///
/// Storage phases run on tokio's blocking pool, so `call` must be awaited
/// inside a tokio runtime.
pub struct AsyncCachedFn<R, F> {
    id: TargetId,
    signature: Signature,
    store: Store<R>,
    target: F,
}

impl<R, F> AsyncCachedFn<R, F> {
    /// Wrap `target`, storing its entries under `id`
    pub fn new(
        config: impl Into<Arc<CacheConfig<R>>>,
        id: TargetId,
        signature: Signature,
        target: F,
    ) -> Self {
        Self {
            id,
            signature,
            store: Store::new(config.into()),
            target,
        }
    }

    /// The wrapped function, callable without caching
    pub const fn target(&self) -> &F {
        &self.target
    }

    /// Run the call protocol, awaiting the target.
    pub async fn call<E, Fut>(&self, args: &CallArgs) -> std::result::Result<R, E>
    where
        F: Fn(BoundArguments) -> Fut,
        Fut: Future<Output = std::result::Result<R, E>>,
        E: From<Error>,
        R: Send + 'static,
    {
        let config = Arc::clone(self.store.config());
        let Prepared {
            bound,
            canonical,
            path,
        } = prepare(&config, &self.id, &self.signature, args)?;

        let store = self.store.clone();
        let lookup_path = path.clone();
        let cached = blocking(move || {
            if store.valid(&lookup_path) {
                store.read_output(&lookup_path).map(Some)
            } else {
                Ok(None)
            }
        })
        .await?;
        if let Some(hit) = cached {
            emit_cache_hit!(self.id, path);
            return Ok(hit);
        }

        emit_cache_miss!(self.id, path);
        let store = self.store.clone();
        let input_path = path.clone();
        blocking(move || store.write_input(&input_path, &canonical)).await?;

        let result = (self.target)(bound).await?;
        check_result(&config, &self.id, &path, &result)?;

        let store = self.store.clone();
        let output_path = path.clone();
        let (result, bytes) = blocking(move || {
            let bytes = store.write_output(&output_path, &result)?;
            Ok((result, bytes))
        })
        .await?;
        emit_cache_stored!(self.id, path, bytes);
        Ok(result)
    }
}

impl<R, F> Introspect<R> for AsyncCachedFn<R, F> {
    fn target_id(&self) -> &TargetId {
        &self.id
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn store(&self) -> &Store<R> {
        &self.store
    }
}

impl<R, F> fmt::Debug for AsyncCachedFn<R, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncCachedFn")
            .field("id", &self.id)
            .field("signature", &self.signature)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
