//! Declared parameter metadata and argument binding
//!
//! A cached function declares its parameters up front with a [`Signature`].
//! Calls supply [`CallArgs`] (positional and keyword values), which are bound
//! to parameter names to produce [`BoundArguments`]. Binding makes `f(1, 2)`
//! and `f(x=1, y=2)` indistinguishable, which is what lets both share a
//! cache key. [`BoundArguments::canonicalize`] then drops ignored parameters
//! and swaps a receiver for selected attributes, yielding the
//! [`CanonicalArguments`] that get hashed and stored.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
struct Param {
    name: String,
    default: Option<Value>,
}

/// Ordered parameter list of a cached function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    params: Vec<Param>,
    has_receiver: bool,
}

impl Signature {
    /// Declare required parameters, in call order.
    #[must_use]
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            params: names
                .into_iter()
                .map(|name| Param {
                    name: name.into(),
                    default: None,
                })
                .collect(),
            has_receiver: false,
        }
    }

    /// Declare a method: `receiver` is bound first and replaced by selected
    /// attributes during canonicalization.
    #[must_use]
    pub fn method<I, S>(receiver: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut sig = Self::new(std::iter::once(receiver.into()).chain(names.into_iter().map(Into::into)));
        sig.has_receiver = true;
        sig
    }

    /// Append a required parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            default: None,
        });
        self
    }

    /// Append a parameter with a default value.
    #[must_use]
    pub fn param_with_default(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.params.push(Param {
            name: name.into(),
            default: Some(default.into()),
        });
        self
    }

    /// Parameter names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }

    /// Whether the first parameter is a receiver.
    #[must_use]
    pub const fn has_receiver(&self) -> bool {
        self.has_receiver
    }

    /// Bind call arguments to parameter names, filling defaults.
    pub fn bind(&self, call: &CallArgs) -> Result<BoundArguments> {
        if call.positional.len() > self.params.len() {
            return Err(Error::invalid_argument(format!(
                "takes {} positional arguments but {} were given",
                self.params.len(),
                call.positional.len()
            )));
        }

        if let Some(unknown) = call
            .keyword
            .keys()
            .find(|k| !self.params.iter().any(|p| &p.name == *k))
        {
            return Err(Error::invalid_argument(format!(
                "got an unexpected keyword argument '{unknown}'"
            )));
        }

        let mut values = Vec::with_capacity(self.params.len());
        for (idx, param) in self.params.iter().enumerate() {
            let positional = call.positional.get(idx);
            let keyword = call.keyword.get(&param.name);
            let value = match (positional, keyword) {
                (Some(_), Some(_)) => {
                    return Err(Error::invalid_argument(format!(
                        "got multiple values for argument '{}'",
                        param.name
                    )));
                }
                (Some(v), None) | (None, Some(v)) => v.clone(),
                (None, None) => param.default.clone().ok_or_else(|| {
                    Error::invalid_argument(format!(
                        "missing required argument '{}'",
                        param.name
                    ))
                })?,
            };
            values.push((param.name.clone(), value));
        }

        Ok(BoundArguments {
            values,
            has_receiver: self.has_receiver,
        })
    }
}

/// Arguments of a single call, as the caller wrote them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallArgs {
    /// Positional values, in order
    pub positional: Vec<Value>,
    /// Keyword values, by parameter name
    pub keyword: BTreeMap<String, Value>,
}

impl CallArgs {
    /// An empty argument list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional value.
    #[must_use]
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a keyword value.
    #[must_use]
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    /// Append any serializable value positionally.
    pub fn try_arg<T: Serialize>(self, value: &T) -> Result<Self> {
        let value = to_value(value)?;
        Ok(self.arg(value))
    }

    /// Set any serializable value as a keyword argument.
    pub fn try_kwarg<T: Serialize>(self, name: impl Into<String>, value: &T) -> Result<Self> {
        let value = to_value(value)?;
        Ok(self.kwarg(name, value))
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| Error::invalid_argument(format!("argument is not serializable: {e}")))
}

/// Call arguments bound to parameter names, in declaration order.
///
/// This is what the target function receives.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundArguments {
    values: Vec<(String, Value)>,
    has_receiver: bool,
}

impl BoundArguments {
    /// Value bound to `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Deserialize the value bound to `name`.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self
            .get(name)
            .ok_or_else(|| Error::invalid_argument(format!("no argument named '{name}'")))?;
        T::deserialize(value).map_err(|e| {
            Error::invalid_argument(format!("argument '{name}' has unexpected type: {e}"))
        })
    }

    /// The receiver, when the signature declares one
    #[must_use]
    pub fn receiver(&self) -> Option<&Value> {
        if self.has_receiver {
            self.values.first().map(|(_, v)| v)
        } else {
            None
        }
    }

    /// Iterate `(name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Reduce to the mapping that identifies this call.
    ///
    /// Parameters named in `ignore` are dropped. When a receiver is declared
    /// it is removed and each name in `receiver_attrs` is read from the
    /// receiver's JSON object and added as its own entry. An ignored
    /// receiver contributes no attributes.
    pub fn canonicalize(
        &self,
        ignore: &[String],
        receiver_attrs: &[String],
    ) -> Result<CanonicalArguments> {
        let mut map: BTreeMap<String, Value> = self
            .values
            .iter()
            .filter(|(name, _)| !ignore.contains(name))
            .cloned()
            .collect();

        if let Some((receiver_name, _)) = self.values.first().filter(|_| self.has_receiver) {
            let receiver = map.remove(receiver_name);
            if let Some(receiver) = receiver.filter(|_| !receiver_attrs.is_empty()) {
                let object = receiver.as_object().ok_or_else(|| {
                    Error::invalid_argument(format!(
                        "receiver '{receiver_name}' is not an object; cannot read attributes"
                    ))
                })?;
                for attr in receiver_attrs {
                    let value = object.get(attr).ok_or_else(|| {
                        Error::invalid_argument(format!(
                            "receiver '{receiver_name}' has no attribute '{attr}'"
                        ))
                    })?;
                    map.insert(attr.clone(), value.clone());
                }
            }
        }

        Ok(CanonicalArguments(map))
    }
}

/// Order-independent mapping from parameter name to value.
///
/// The stored input record of a cache entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalArguments(BTreeMap<String, Value>);

impl CanonicalArguments {
    /// Value for `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying map
    #[must_use]
    pub const fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.0
    }

    /// Take the underlying map
    #[must_use]
    pub fn into_map(self) -> BTreeMap<String, Value> {
        self.0
    }
}

impl From<BTreeMap<String, Value>> for CanonicalArguments {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn xy() -> Signature {
        Signature::new(["x", "y"])
    }

    #[test]
    fn test_positional_and_keyword_bind_identically() {
        let a = xy().bind(&CallArgs::new().arg(1).arg(2)).unwrap();
        let b = xy().bind(&CallArgs::new().kwarg("y", 2).kwarg("x", 1)).unwrap();
        let c = xy().bind(&CallArgs::new().arg(1).kwarg("y", 2)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_defaults_fill_missing() {
        let sig = Signature::new(["x"]).param_with_default("fail", true);
        let bound = sig.bind(&CallArgs::new().arg(3)).unwrap();
        assert_eq!(bound.get("fail"), Some(&json!(true)));
        assert_eq!(bound.get_as::<i64>("x").unwrap(), 3);
    }

    #[test]
    fn test_missing_required_argument() {
        let err = xy().bind(&CallArgs::new().arg(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert!(err.to_string().contains("'y'"));
    }

    #[test]
    fn test_too_many_positional() {
        let err = xy().bind(&CallArgs::new().arg(1).arg(2).arg(3)).unwrap_err();
        assert!(err.to_string().contains("3 were given"));
    }

    #[test]
    fn test_unknown_keyword() {
        let err = xy()
            .bind(&CallArgs::new().arg(1).arg(2).kwarg("z", 0))
            .unwrap_err();
        assert!(err.to_string().contains("'z'"));
    }

    #[test]
    fn test_duplicate_value() {
        let err = xy()
            .bind(&CallArgs::new().arg(1).arg(2).kwarg("x", 1))
            .unwrap_err();
        assert!(err.to_string().contains("multiple values"));
    }

    #[test]
    fn test_get_as_wrong_type() {
        let bound = xy().bind(&CallArgs::new().arg("a").arg(2)).unwrap();
        assert!(bound.get_as::<i64>("x").is_err());
        assert!(bound.get_as::<i64>("nope").is_err());
    }

    #[test]
    fn test_canonicalize_drops_ignored() {
        let sig = Signature::new(["x", "client"]);
        let bound = sig
            .bind(&CallArgs::new().arg(1).kwarg("client", "conn-1"))
            .unwrap();
        let canonical = bound.canonicalize(&["client".into()], &[]).unwrap();
        assert_eq!(canonical.len(), 1);
        assert_eq!(canonical.get("x"), Some(&json!(1)));
    }

    #[test]
    fn test_canonicalize_replaces_receiver_with_attrs() {
        let sig = Signature::method("self", ["n"]);
        let receiver = json!({"region": "eu", "token": "secret"});
        let bound = sig.bind(&CallArgs::new().arg(receiver).arg(5)).unwrap();
        assert_eq!(bound.receiver().unwrap()["region"], "eu");

        let canonical = bound.canonicalize(&[], &["region".into()]).unwrap();
        assert_eq!(
            canonical.as_map().keys().collect::<Vec<_>>(),
            vec!["n", "region"]
        );
        assert!(canonical.get("self").is_none());
        assert!(canonical.get("token").is_none());
    }

    #[test]
    fn test_canonicalize_receiver_without_attrs_is_dropped() {
        let sig = Signature::method("self", ["n"]);
        let bound = sig.bind(&CallArgs::new().arg(json!({})).arg(5)).unwrap();
        let canonical = bound.canonicalize(&[], &[]).unwrap();
        assert_eq!(canonical.len(), 1);
    }

    #[test]
    fn test_canonicalize_missing_receiver_attr() {
        let sig = Signature::method("self", ["n"]);
        let bound = sig.bind(&CallArgs::new().arg(json!({})).arg(5)).unwrap();
        let err = bound.canonicalize(&[], &["region".into()]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn test_canonicalize_ignored_receiver_skips_attrs() {
        let sig = Signature::method("self", ["n"]);
        let bound = sig
            .bind(&CallArgs::new().arg(json!({"scale": 2})).arg(5))
            .unwrap();
        let canonical = bound
            .canonicalize(&["self".into()], &["scale".into()])
            .unwrap();
        assert_eq!(canonical.as_map().keys().collect::<Vec<_>>(), vec!["n"]);
    }

    #[test]
    fn test_try_arg_serializes_structs() {
        #[derive(Serialize)]
        struct Req {
            id: u32,
        }
        let call = CallArgs::new().try_arg(&Req { id: 4 }).unwrap();
        assert_eq!(call.positional, vec![json!({"id": 4})]);
    }
}
