//! Entry validity checks
//!
//! A [`ValidatorChain`] decides whether the entry stored at a path may be
//! returned instead of calling the target. Validators run in order and the
//! chain stops at the first one that rejects the entry or fails. A failing
//! validator is never an error for the caller: it only turns the lookup
//! into a cache miss.

use crate::error::BoxError;
use crate::events::emit_validator_failed;
use chrono::{DateTime, TimeDelta, Utc};
use recall_storage::Storage;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Named predicate over a stored entry.
pub trait Validator: Send + Sync {
    /// Stable diagnostic name, logged when the validator rejects an entry
    fn name(&self) -> &str;

    /// Whether the entry at `path` is usable.
    ///
    /// `Ok(false)` and `Err(_)` are treated alike: the entry is not used.
    fn validate(&self, storage: &dyn Storage, path: &str) -> Result<bool, BoxError>;
}

/// The entry must exist.
#[derive(Debug, Clone, Copy, Default)]
pub struct Exists;

impl Validator for Exists {
    fn name(&self) -> &str {
        "exists"
    }

    fn validate(&self, storage: &dyn Storage, path: &str) -> Result<bool, BoxError> {
        Ok(storage.exists(path)?)
    }
}

/// How long an entry stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Valid for this long after its last write
    Duration(Duration),
    /// Valid for this many seconds after its last write
    Seconds(u64),
    /// Valid only if written at or after this instant
    Cutoff(DateTime<Utc>),
}

impl Ttl {
    /// Oldest modification time still considered fresh at `now`.
    #[must_use]
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let window = match *self {
            Self::Cutoff(at) => return at,
            Self::Duration(d) => TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX),
            Self::Seconds(s) => i64::try_from(s)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .unwrap_or(TimeDelta::MAX),
        };
        now.checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl Ttl {
    /// Whether this is a zero-length window.
    ///
    /// A zero TTL still validates entries but does not trigger append-mode
    /// snapshots.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        match *self {
            Self::Duration(d) => d.is_zero(),
            Self::Seconds(s) => s == 0,
            Self::Cutoff(_) => false,
        }
    }
}

impl From<Duration> for Ttl {
    fn from(d: Duration) -> Self {
        Self::Duration(d)
    }
}

impl From<u64> for Ttl {
    fn from(s: u64) -> Self {
        Self::Seconds(s)
    }
}

impl From<DateTime<Utc>> for Ttl {
    fn from(at: DateTime<Utc>) -> Self {
        Self::Cutoff(at)
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duration(d) => write!(f, "{}s", d.as_secs_f64()),
            Self::Seconds(s) => write!(f, "{s}s"),
            Self::Cutoff(at) => write!(f, "since {}", at.to_rfc3339()),
        }
    }
}

/// The entry must have been written within the configured [`Ttl`].
#[derive(Debug, Clone, Copy)]
pub struct TtlValidator {
    ttl: Ttl,
}

impl TtlValidator {
    /// Create a TTL check
    #[must_use]
    pub const fn new(ttl: Ttl) -> Self {
        Self { ttl }
    }

    /// The configured TTL
    #[must_use]
    pub const fn ttl(&self) -> Ttl {
        self.ttl
    }
}

impl Validator for TtlValidator {
    fn name(&self) -> &str {
        "has_passed_cache_ttl"
    }

    fn validate(&self, storage: &dyn Storage, path: &str) -> Result<bool, BoxError> {
        let modified = storage.modified(path)?;
        Ok(modified >= self.ttl.cutoff(Utc::now()))
    }
}

type PredicateFn = dyn Fn(&dyn Storage, &str) -> Result<bool, BoxError> + Send + Sync;

/// A validator built from a name and a closure.
///
/// ```
/// use recall_cache::FnValidator;
///
/// let non_empty = FnValidator::new("non_empty", |storage, path| {
///     Ok(!storage.read(path)?.is_empty())
/// });
/// # let _ = non_empty;
/// ```
#[derive(Clone)]
pub struct FnValidator {
    name: String,
    predicate: Arc<PredicateFn>,
}

impl FnValidator {
    /// Create a named predicate
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&dyn Storage, &str) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }
}

impl fmt::Debug for FnValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnValidator").field("name", &self.name).finish()
    }
}

impl Validator for FnValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, storage: &dyn Storage, path: &str) -> Result<bool, BoxError> {
        (self.predicate)(storage, path)
    }
}

/// Ordered validators with short-circuit evaluation.
#[derive(Clone)]
pub struct ValidatorChain {
    validators: Vec<Arc<dyn Validator>>,
}

impl ValidatorChain {
    /// Chain of exactly these validators
    #[must_use]
    pub fn new(validators: Vec<Arc<dyn Validator>>) -> Self {
        Self { validators }
    }

    /// Append a validator
    pub fn push(&mut self, validator: Arc<dyn Validator>) {
        self.validators.push(validator);
    }

    /// Names in evaluation order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.validators.iter().map(|v| v.name())
    }

    /// The validators in evaluation order
    #[must_use]
    pub fn validators(&self) -> &[Arc<dyn Validator>] {
        &self.validators
    }

    /// Number of validators
    #[must_use]
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Whether the chain is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Whether every validator accepts the entry at `path`.
    pub fn valid(&self, storage: &dyn Storage, path: &str) -> bool {
        for validator in &self.validators {
            match validator.validate(storage, path) {
                Ok(true) => {}
                Ok(false) => {
                    emit_validator_failed!(validator.name(), path, "Validation not true");
                    return false;
                }
                Err(e) => {
                    emit_validator_failed!(validator.name(), path, e);
                    return false;
                }
            }
        }
        true
    }
}

impl Default for ValidatorChain {
    fn default() -> Self {
        Self::new(vec![Arc::new(Exists)])
    }
}

impl fmt::Debug for ValidatorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
