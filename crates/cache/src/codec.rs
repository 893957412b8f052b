//! Pluggable encode/decode pairs for stored inputs and outputs

use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Converts values of `T` to bytes and back.
pub trait Codec<T>: Send + Sync {
    /// Diagnostic name, used in error messages
    fn name(&self) -> &str;

    /// Encode a value to bytes
    fn encode(&self, value: &T) -> Result<Vec<u8>>;

    /// Decode a value from bytes
    fn decode(&self, bytes: &[u8]) -> Result<T>;
}

/// JSON via `serde_json`. The default codec for inputs and outputs.
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    /// Create a JSON codec
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonCodec")
    }
}

impl<T> Codec<T> for JsonCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn name(&self) -> &str {
        "json"
    }

    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| Error::codec("json", format!("encode: {e}")))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| Error::codec("json", format!("decode: {e}")))
    }
}

type EncodeFn<T> = Arc<dyn Fn(&T) -> Result<Vec<u8>> + Send + Sync>;
type DecodeFn<T> = Arc<dyn Fn(&[u8]) -> Result<T> + Send + Sync>;

/// A named pair of encode/decode functions.
///
/// ```
/// use recall_cache::{Codec, Error, FnCodec};
///
/// let utf8 = FnCodec::new(
///     "utf8",
///     |s: &String| Ok(s.as_bytes().to_vec()),
///     |b: &[u8]| String::from_utf8(b.to_vec()).map_err(|e| Error::codec("utf8", e.to_string())),
/// );
/// let bytes = utf8.encode(&"hi".to_string()).unwrap();
/// assert_eq!(utf8.decode(&bytes).unwrap(), "hi");
/// ```
pub struct FnCodec<T> {
    name: String,
    encode: EncodeFn<T>,
    decode: DecodeFn<T>,
}

impl<T> FnCodec<T> {
    /// Create a codec from two functions
    pub fn new<E, D>(name: impl Into<String>, encode: E, decode: D) -> Self
    where
        E: Fn(&T) -> Result<Vec<u8>> + Send + Sync + 'static,
        D: Fn(&[u8]) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            encode: Arc::new(encode),
            decode: Arc::new(decode),
        }
    }
}

impl<T> Clone for FnCodec<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            encode: Arc::clone(&self.encode),
            decode: Arc::clone(&self.decode),
        }
    }
}

impl<T> fmt::Debug for FnCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCodec").field("name", &self.name).finish()
    }
}

impl<T> Codec<T> for FnCodec<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        (self.encode)(value)
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        (self.decode)(bytes)
    }
}
