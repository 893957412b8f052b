//! Pluggable codecs for input records and output entries

use recall_cache::{
    BoundArguments, CacheConfig, CachedFn, CallArgs, CanonicalArguments, Codec, Error, FnCodec,
    Introspect, JsonCodec, Signature, TargetId,
};
use recall_storage::{MemoryStorage, Storage};
use std::sync::Arc;

/// Outputs stored as decimal text
fn decimal_codec() -> FnCodec<i64> {
    FnCodec::new(
        "decimal",
        |n: &i64| Ok(n.to_string().into_bytes()),
        |b: &[u8]| {
            std::str::from_utf8(b)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| Error::codec("decimal", "not a decimal integer"))
        },
    )
}

/// Input records stored as pretty-printed JSON behind a marker line
fn annotated_inputs_codec() -> FnCodec<CanonicalArguments> {
    const MARKER: &[u8] = b"#inputs\n";
    FnCodec::new(
        "annotated-json",
        |args: &CanonicalArguments| {
            let body = serde_json::to_vec_pretty(args)
                .map_err(|e| Error::codec("annotated-json", e.to_string()))?;
            Ok([MARKER, body.as_slice()].concat())
        },
        |b: &[u8]| {
            let body = b
                .strip_prefix(MARKER)
                .ok_or_else(|| Error::codec("annotated-json", "missing marker"))?;
            serde_json::from_slice(body).map_err(|e| Error::codec("annotated-json", e.to_string()))
        },
    )
}

fn add(
    config: CacheConfig<i64>,
) -> CachedFn<i64, impl Fn(&BoundArguments) -> recall_cache::Result<i64>> {
    CachedFn::new(
        config,
        TargetId::new("tests", "add"),
        Signature::new(["x", "y"]),
        |args: &BoundArguments| {
            Ok::<_, Error>(args.get_as::<i64>("x")? + args.get_as::<i64>("y")?)
        },
    )
}

#[test]
fn test_input_and_output_codecs_are_independent() {
    let memory = MemoryStorage::new();
    let output_codec: Arc<dyn Codec<i64>> = Arc::new(decimal_codec());
    let config = CacheConfig::builder_with_codec(Arc::new(memory.clone()), output_codec)
        .input_codec(Arc::new(annotated_inputs_codec()))
        .build()
        .unwrap();
    let add = add(config);
    let args = CallArgs::new().arg(40).arg(2);

    assert_eq!(add.call(&args).unwrap(), 42);
    assert_eq!(add.call(&args).unwrap(), 42);

    let path = add.entry_path(args.clone()).unwrap();
    assert_eq!(memory.read(&path).unwrap(), b"42");
    let record = memory.read(&format!("{path}.inputs")).unwrap();
    assert!(record.starts_with(b"#inputs\n"));

    let inputs = add.load_cached_inputs(args.clone()).unwrap();
    assert_eq!(inputs.get("x"), Some(&serde_json::json!(40)));
    assert_eq!(add.load_cached_data(args).unwrap(), 42);
}

#[test]
fn test_per_call_codec_override() {
    let memory = MemoryStorage::new();
    let config = CacheConfig::<i64>::builder(Arc::new(memory.clone()))
        .build()
        .unwrap();
    let add = add(config);
    let args = CallArgs::new().arg(1).arg(2);
    let path = add.entry_path(args.clone()).unwrap();

    let written = add
        .store()
        .write_output_with(&path, &-7, &decimal_codec())
        .unwrap();
    assert_eq!(written, 2);
    assert_eq!(memory.read(&path).unwrap(), b"-7");
    assert_eq!(add.load_cached_data_with(args.clone(), &decimal_codec()).unwrap(), -7);

    add.store().write_output(&path, &3).unwrap();
    assert_eq!(add.load_cached_data(args.clone()).unwrap(), 3);

    let (_, canonical) = add.tokenize(&args).unwrap();
    add.store()
        .write_input_with(&path, &canonical, &annotated_inputs_codec())
        .unwrap();
    assert!(add.load_cached_inputs(args.clone()).is_err());
    assert_eq!(
        add.load_cached_inputs_with(args, &annotated_inputs_codec()).unwrap(),
        canonical
    );
}

#[test]
fn test_key_ignores_input_codec() {
    let json = CacheConfig::<i64>::builder(Arc::new(MemoryStorage::new()))
        .input_codec(Arc::new(JsonCodec::<CanonicalArguments>::new()))
        .build()
        .unwrap();
    let annotated = CacheConfig::<i64>::builder(Arc::new(MemoryStorage::new()))
        .input_codec(Arc::new(annotated_inputs_codec()))
        .build()
        .unwrap();
    let args = CallArgs::new().kwarg("y", 2).kwarg("x", 1);

    let json_add = add(json);
    let annotated_add = add(annotated);
    assert_eq!(json_add.key(&args).unwrap(), annotated_add.key(&args).unwrap());
    assert_eq!(json_add.config().input_codec().name(), "json");
    assert_eq!(annotated_add.config().input_codec().name(), "annotated-json");
}
