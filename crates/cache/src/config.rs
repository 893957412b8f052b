//! Cache configuration
//!
//! A [`CacheConfig`] is built once per cached function and never mutated.
//! [`CacheConfig::replace`] seeds a new builder from an existing config for
//! variations (a different prefix, a shorter TTL, ...).
//!
//! Deployment-level knobs can also come from TOML or the environment via
//! [`CacheSettings`]:
//!
//! ```toml
//! prefix = "/var/cache/recall"
//! ttl = 3600                 # seconds, or an RFC 3339 cutoff timestamp
//! expiry_mode = "append"     # or "remove"
//! ignore = ["client"]
//! receiver_attrs = ["region"]
//! ```

use crate::codec::{Codec, JsonCodec};
use crate::error::BoxError;
use crate::path::{PathFn, PathResolver, TargetId};
use crate::signature::{BoundArguments, CanonicalArguments};
use crate::validators::{Exists, Ttl, TtlValidator, Validator, ValidatorChain};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use recall_storage::Storage;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Environment variable overriding the storage prefix
pub const ENV_PREFIX: &str = "RECALL_CACHE_PREFIX";
/// Environment variable holding the TTL (seconds or RFC 3339 cutoff)
pub const ENV_TTL: &str = "RECALL_CACHE_TTL";
/// Environment variable holding the expiry mode (`remove` or `append`)
pub const ENV_EXPIRY_MODE: &str = "RECALL_CACHE_EXPIRY_MODE";

/// What happens to an entry that is recomputed after expiring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryMode {
    /// Overwrite the entry in place
    #[default]
    Remove,
    /// Keep a timestamped snapshot of every write next to the entry
    Append,
}

impl FromStr for ExpiryMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remove" => Ok(Self::Remove),
            "append" => Ok(Self::Append),
            other => Err(Error::configuration(format!(
                "unknown expiry mode '{other}' (expected 'remove' or 'append')"
            ))),
        }
    }
}

/// Check applied to a freshly computed result before it is cached.
///
/// `Ok(false)` rejects the result; `Err(cause)` rejects it and is wrapped as
/// the source of the resulting [`Error::Validation`].
pub type ResultValidator<R> = Arc<dyn Fn(&R) -> std::result::Result<bool, BoxError> + Send + Sync>;

/// Immutable configuration of a cached function.
pub struct CacheConfig<R> {
    storage: Arc<dyn Storage>,
    resolver: PathResolver,
    input_codec: Arc<dyn Codec<CanonicalArguments>>,
    output_codec: Arc<dyn Codec<R>>,
    ttl: Option<Ttl>,
    expiry_mode: ExpiryMode,
    configured_validators: Vec<Arc<dyn Validator>>,
    validators: ValidatorChain,
    ignore: Vec<String>,
    receiver_attrs: Vec<String>,
    result_validator: Option<ResultValidator<R>>,
}

impl<R> CacheConfig<R>
where
    R: Serialize + DeserializeOwned + 'static,
{
    /// Start a config whose outputs are stored as JSON
    #[must_use]
    pub fn builder(storage: Arc<dyn Storage>) -> CacheConfigBuilder<R> {
        Self::builder_with_codec(storage, Arc::new(JsonCodec::<R>::new()))
    }
}

impl<R> CacheConfig<R> {
    /// Start a config with an explicit output codec
    #[must_use]
    pub fn builder_with_codec(
        storage: Arc<dyn Storage>,
        output_codec: Arc<dyn Codec<R>>,
    ) -> CacheConfigBuilder<R> {
        CacheConfigBuilder {
            storage,
            resolver: PathResolver::default(),
            input_codec: Arc::new(JsonCodec::<CanonicalArguments>::new()),
            output_codec,
            ttl: None,
            expiry_mode: ExpiryMode::default(),
            validators: None,
            ignore: Vec::new(),
            receiver_attrs: Vec::new(),
            result_validator: None,
        }
    }

    /// A builder seeded with this config's settings.
    ///
    /// The original config is left untouched.
    #[must_use]
    pub fn replace(&self) -> CacheConfigBuilder<R> {
        CacheConfigBuilder {
            storage: Arc::clone(&self.storage),
            resolver: self.resolver.clone(),
            input_codec: Arc::clone(&self.input_codec),
            output_codec: Arc::clone(&self.output_codec),
            ttl: self.ttl,
            expiry_mode: self.expiry_mode,
            validators: Some(self.configured_validators.clone()),
            ignore: self.ignore.clone(),
            receiver_attrs: self.receiver_attrs.clone(),
            result_validator: self.result_validator.clone(),
        }
    }

    /// Storage capability
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Path resolver
    #[must_use]
    pub const fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Directory holding the entries of `target`
    #[must_use]
    pub fn path(&self, target: &TargetId, args: Option<&BoundArguments>) -> String {
        self.resolver.resolve(target, args)
    }

    /// Codec for input records
    #[must_use]
    pub fn input_codec(&self) -> &Arc<dyn Codec<CanonicalArguments>> {
        &self.input_codec
    }

    /// Codec for output entries
    #[must_use]
    pub fn output_codec(&self) -> &Arc<dyn Codec<R>> {
        &self.output_codec
    }

    /// Configured TTL
    #[must_use]
    pub const fn ttl(&self) -> Option<Ttl> {
        self.ttl
    }

    /// Configured expiry mode
    #[must_use]
    pub const fn expiry_mode(&self) -> ExpiryMode {
        self.expiry_mode
    }

    /// Whether output writes also produce timestamped snapshots.
    ///
    /// Only append mode with a non-zero TTL does.
    #[must_use]
    pub fn writes_snapshots(&self) -> bool {
        matches!(self.expiry_mode, ExpiryMode::Append) && self.ttl.is_some_and(|t| !t.is_zero())
    }

    /// Effective validator chain, including the TTL check
    #[must_use]
    pub const fn validators(&self) -> &ValidatorChain {
        &self.validators
    }

    /// Parameters excluded from the cache key
    #[must_use]
    pub fn ignore(&self) -> &[String] {
        &self.ignore
    }

    /// Receiver attributes folded into the cache key
    #[must_use]
    pub fn receiver_attrs(&self) -> &[String] {
        &self.receiver_attrs
    }

    /// Result validator, if any
    #[must_use]
    pub fn result_validator(&self) -> Option<&ResultValidator<R>> {
        self.result_validator.as_ref()
    }
}

impl<R> fmt::Debug for CacheConfig<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("protocol", &self.storage.protocol())
            .field("resolver", &self.resolver)
            .field("input_codec", &self.input_codec.name())
            .field("output_codec", &self.output_codec.name())
            .field("ttl", &self.ttl)
            .field("expiry_mode", &self.expiry_mode)
            .field("validators", &self.validators)
            .field("ignore", &self.ignore)
            .field("receiver_attrs", &self.receiver_attrs)
            .field("result_validator", &self.result_validator.is_some())
            .finish()
    }
}

/// Builder for [`CacheConfig`].
pub struct CacheConfigBuilder<R> {
    storage: Arc<dyn Storage>,
    resolver: PathResolver,
    input_codec: Arc<dyn Codec<CanonicalArguments>>,
    output_codec: Arc<dyn Codec<R>>,
    ttl: Option<Ttl>,
    expiry_mode: ExpiryMode,
    validators: Option<Vec<Arc<dyn Validator>>>,
    ignore: Vec<String>,
    receiver_attrs: Vec<String>,
    result_validator: Option<ResultValidator<R>>,
}

impl<R> CacheConfigBuilder<R> {
    /// Swap the storage capability
    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = storage;
        self
    }

    /// Store entries under `prefix/module.name`
    #[must_use]
    pub fn prefix(mut self, prefix: impl AsRef<str>) -> Self {
        self.resolver = PathResolver::prefixed(Some(prefix.as_ref()));
        self
    }

    /// Resolve storage directories with a custom function
    #[must_use]
    pub fn path_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&TargetId, Option<&BoundArguments>) -> String + Send + Sync + 'static,
    {
        let f: PathFn = Arc::new(f);
        self.resolver = PathResolver::Custom(f);
        self
    }

    /// Codec for input records
    #[must_use]
    pub fn input_codec(mut self, codec: Arc<dyn Codec<CanonicalArguments>>) -> Self {
        self.input_codec = codec;
        self
    }

    /// Codec for output entries
    #[must_use]
    pub fn output_codec(mut self, codec: Arc<dyn Codec<R>>) -> Self {
        self.output_codec = codec;
        self
    }

    /// Entries older than `ttl` are recomputed
    #[must_use]
    pub fn ttl(mut self, ttl: impl Into<Ttl>) -> Self {
        self.ttl = Some(ttl.into());
        self
    }

    /// Entries never expire
    #[must_use]
    pub fn no_ttl(mut self) -> Self {
        self.ttl = None;
        self
    }

    /// Overwrite or snapshot on recomputation
    #[must_use]
    pub fn expiry_mode(mut self, mode: ExpiryMode) -> Self {
        self.expiry_mode = mode;
        self
    }

    /// Replace the validator list. An existence check is added in front
    /// when missing, and the TTL check is appended at build time.
    #[must_use]
    pub fn validators(mut self, validators: Vec<Arc<dyn Validator>>) -> Self {
        self.validators = Some(validators);
        self
    }

    /// Append one validator after the current list
    #[must_use]
    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validators
            .get_or_insert_with(|| vec![Arc::new(Exists)])
            .push(validator);
        self
    }

    /// Parameters excluded from the cache key (still passed to the target)
    #[must_use]
    pub fn ignore<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore = names.into_iter().map(Into::into).collect();
        self
    }

    /// Receiver attributes that stand in for the receiver in the cache key
    #[must_use]
    pub fn receiver_attrs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.receiver_attrs = names.into_iter().map(Into::into).collect();
        self
    }

    /// Reject results before they are cached
    #[must_use]
    pub fn result_validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&R) -> std::result::Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.result_validator = Some(Arc::new(f));
        self
    }

    /// Apply file/environment settings on top of the current values
    #[must_use]
    pub fn settings(mut self, settings: &CacheSettings) -> Self {
        if let Some(prefix) = &settings.prefix {
            self = self.prefix(prefix);
        }
        if let Some(ttl) = settings.ttl {
            self.ttl = Some(ttl.into());
        }
        if let Some(mode) = settings.expiry_mode {
            self.expiry_mode = mode;
        }
        if !settings.ignore.is_empty() {
            self.ignore.clone_from(&settings.ignore);
        }
        if !settings.receiver_attrs.is_empty() {
            self.receiver_attrs.clone_from(&settings.receiver_attrs);
        }
        self
    }

    /// Validate and freeze the configuration
    pub fn build(self) -> Result<CacheConfig<R>> {
        let mut configured = self
            .validators
            .unwrap_or_else(|| vec![Arc::new(Exists)]);

        if let Some(unnamed) = configured.iter().position(|v| v.name().trim().is_empty()) {
            return Err(Error::configuration(format!(
                "validator at position {unnamed} must have a non-empty name"
            )));
        }
        if !configured.iter().any(|v| v.name() == Exists.name()) {
            configured.insert(0, Arc::new(Exists));
        }

        let mut validators = ValidatorChain::new(configured.clone());
        if let Some(ttl) = self.ttl {
            validators.push(Arc::new(TtlValidator::new(ttl)));
        }

        Ok(CacheConfig {
            storage: self.storage,
            resolver: self.resolver,
            input_codec: self.input_codec,
            output_codec: self.output_codec,
            ttl: self.ttl,
            expiry_mode: self.expiry_mode,
            configured_validators: configured,
            validators,
            ignore: self.ignore,
            receiver_attrs: self.receiver_attrs,
            result_validator: self.result_validator,
        })
    }
}

/// TTL as written in settings: integer seconds or an RFC 3339 cutoff.
///
/// In TOML the cutoff may be a native offset datetime
/// (`ttl = 2026-01-01T00:00:00Z`) or a quoted string. Local datetimes
/// without an offset are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawTtlSetting")]
pub enum TtlSetting {
    /// Seconds since last write
    Seconds(u64),
    /// Absolute cutoff
    Cutoff(DateTime<Utc>),
}

/// Shapes a TTL can take in a settings document.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTtlSetting {
    Seconds(u64),
    Text(String),
    Native(toml::value::Datetime),
}

impl TryFrom<RawTtlSetting> for TtlSetting {
    type Error = Error;

    fn try_from(raw: RawTtlSetting) -> Result<Self> {
        match raw {
            RawTtlSetting::Seconds(s) => Ok(Self::Seconds(s)),
            RawTtlSetting::Text(text) => text.parse(),
            RawTtlSetting::Native(at) => {
                if at.offset.is_none() {
                    return Err(Error::configuration(format!(
                        "ttl cutoff '{at}' needs a UTC offset"
                    )));
                }
                at.to_string().parse()
            }
        }
    }
}

impl Serialize for TtlSetting {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Seconds(s) => serializer.serialize_u64(*s),
            Self::Cutoff(at) => serializer.serialize_str(&at.to_rfc3339()),
        }
    }
}

impl From<TtlSetting> for Ttl {
    fn from(setting: TtlSetting) -> Self {
        match setting {
            TtlSetting::Seconds(s) => Self::Seconds(s),
            TtlSetting::Cutoff(at) => Self::Cutoff(at),
        }
    }
}

impl FromStr for TtlSetting {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(seconds) = s.parse::<u64>() {
            return Ok(Self::Seconds(seconds));
        }
        DateTime::parse_from_rfc3339(s)
            .map(|at| Self::Cutoff(at.with_timezone(&Utc)))
            .map_err(|_| {
                Error::configuration(format!(
                    "invalid ttl '{s}' (expected seconds or an RFC 3339 timestamp)"
                ))
            })
    }
}

/// Deployment settings loadable from TOML or the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    /// Storage prefix
    #[serde(default)]
    pub prefix: Option<String>,
    /// Time-to-live
    #[serde(default)]
    pub ttl: Option<TtlSetting>,
    /// Expiry mode
    #[serde(default)]
    pub expiry_mode: Option<ExpiryMode>,
    /// Parameters excluded from the cache key
    #[serde(default)]
    pub ignore: Vec<String>,
    /// Receiver attributes folded into the cache key
    #[serde(default)]
    pub receiver_attrs: Vec<String>,
}

impl CacheSettings {
    /// Parse settings from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::configuration(format!("invalid cache settings: {e}")))
    }

    /// Read settings from `RECALL_CACHE_*` environment variables.
    ///
    /// Unset or blank variables leave the corresponding setting empty.
    pub fn from_env() -> Result<Self> {
        fn var(name: &str) -> Option<String> {
            std::env::var(name).ok().filter(|s| !s.trim().is_empty())
        }

        Ok(Self {
            prefix: var(ENV_PREFIX),
            ttl: var(ENV_TTL).map(|s| s.parse()).transpose()?,
            expiry_mode: var(ENV_EXPIRY_MODE).map(|s| s.parse()).transpose()?,
            ignore: Vec::new(),
            receiver_attrs: Vec::new(),
        })
    }
}
