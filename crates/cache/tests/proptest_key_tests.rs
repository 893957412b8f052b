//! Property-based tests for cache key stability.
//!
//! - Determinism: the same arguments always produce the same key
//! - Call-style independence: positional and keyword calls agree
//! - Order invariance: keyword order never affects the key

use proptest::prelude::*;
use recall_cache::{CacheConfig, CachedFn, CallArgs, Introspect, Signature, TargetId};
use recall_storage::MemoryStorage;
use serde_json::Value;
use std::sync::Arc;

fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        "[a-z0-9 ]{0,12}".prop_map(Value::from),
        Just(Value::Null),
    ]
}

fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(2, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn keyed() -> CachedFn<i64, fn(&recall_cache::BoundArguments) -> recall_cache::Result<i64>> {
    fn never(_: &recall_cache::BoundArguments) -> recall_cache::Result<i64> {
        Ok(0)
    }
    let config = CacheConfig::<i64>::builder(Arc::new(MemoryStorage::new()))
        .build()
        .unwrap_or_else(|e| panic!("config: {e}"));
    CachedFn::new(
        config,
        TargetId::new("tests", "keyed"),
        Signature::new(["a", "b", "c"]),
        never as fn(&recall_cache::BoundArguments) -> recall_cache::Result<i64>,
    )
}

proptest! {
    #[test]
    fn key_is_deterministic(a in value_strategy(), b in value_strategy(), c in value_strategy()) {
        let f = keyed();
        let args = CallArgs::new().arg(a).arg(b).arg(c);
        prop_assert_eq!(f.key(&args).unwrap(), f.key(&args.clone()).unwrap());
        prop_assert_eq!(f.key(&args).unwrap(), keyed().key(&args).unwrap());
    }

    #[test]
    fn positional_matches_keyword(a in value_strategy(), b in value_strategy(), c in value_strategy()) {
        let f = keyed();
        let positional = CallArgs::new().arg(a.clone()).arg(b.clone()).arg(c.clone());
        let keyword = CallArgs::new().kwarg("c", c).kwarg("a", a).kwarg("b", b);
        prop_assert_eq!(f.key(&positional).unwrap(), f.key(&keyword).unwrap());
    }

    #[test]
    fn mixed_style_matches_keyword(a in value_strategy(), b in value_strategy(), c in value_strategy()) {
        let f = keyed();
        let mixed = CallArgs::new().arg(a.clone()).kwarg("c", c.clone()).kwarg("b", b.clone());
        let keyword = CallArgs::new().kwarg("b", b).kwarg("a", a).kwarg("c", c);
        prop_assert_eq!(f.key(&mixed).unwrap(), f.key(&keyword).unwrap());
    }

    #[test]
    fn different_values_change_key(a in any::<i64>(), b in any::<i64>()) {
        prop_assume!(a != b);
        let f = keyed();
        let left = CallArgs::new().arg(a).arg(0).arg(0);
        let right = CallArgs::new().arg(b).arg(0).arg(0);
        prop_assert_ne!(f.key(&left).unwrap(), f.key(&right).unwrap());
    }

    #[test]
    fn key_is_64_lowercase_hex(a in value_strategy()) {
        let key = keyed().key(&CallArgs::new().arg(a).arg(1).arg(2)).unwrap();
        prop_assert_eq!(key.as_hex().len(), 64);
        prop_assert!(key.as_hex().chars().all(|ch| matches!(ch, '0'..='9' | 'a'..='f')));
    }
}
