//! Cache key derivation

use crate::codec::Codec;
use crate::signature::CanonicalArguments;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest identifying one set of call arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Digest of raw bytes
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(data)))
    }

    /// Create from hex string (validation)
    ///
    /// # Errors
    ///
    /// Returns error if the hex string is invalid or wrong length
    pub fn from_hex(hex: impl Into<String>) -> Result<Self> {
        let s = hex.into();
        if s.len() != 64 {
            return Err(Error::invalid_argument(format!(
                "cache key must be 64 hex characters, got {}",
                s.len()
            )));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::invalid_argument(
                "cache key must contain only hex digits",
            ));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Get the hex representation
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Serialize `value` with `codec` and digest the bytes.
///
/// Returns both the key and the encoded bytes so callers that persist the
/// value do not encode twice.
pub fn tokenize<T>(value: &T, codec: &dyn Codec<T>) -> Result<(CacheKey, Vec<u8>)> {
    let bytes = codec.encode(value)?;
    Ok((CacheKey::from_bytes(&bytes), bytes))
}

/// Key of a set of canonical arguments.
///
/// Always hashed as canonical JSON: object keys are sorted (`BTreeMap`
/// ordering, also for nested objects) and no whitespace is emitted, so the
/// key depends only on the logical arguments and never on the configured
/// input codec.
pub fn key_for_arguments(arguments: &CanonicalArguments) -> Result<CacheKey> {
    let json = serde_json::to_value(arguments)
        .map_err(|e| Error::codec("canonical-json", format!("encode: {e}")))?;
    let bytes = serde_json::to_vec(&json)
        .map_err(|e| Error::codec("canonical-json", format!("serialize: {e}")))?;
    Ok(CacheKey::from_bytes(&bytes))
}
