//! Structured cache events
//!
//! Every event carries `event_type` so subscribers can filter on it without
//! parsing messages. All events use the `recall::cache` target.

/// A valid entry was found and returned without calling the target.
macro_rules! emit_cache_hit {
    ($function:expr, $path:expr) => {
        ::tracing::debug!(
            target: "recall::cache",
            event_type = "cache.hit",
            function = %$function,
            path = %$path,
        )
    };
}

/// No valid entry; the target is about to run.
macro_rules! emit_cache_miss {
    ($function:expr, $path:expr) => {
        ::tracing::debug!(
            target: "recall::cache",
            event_type = "cache.miss",
            function = %$function,
            path = %$path,
        )
    };
}

/// A validator rejected an entry (or failed while checking it).
macro_rules! emit_validator_failed {
    ($validator:expr, $path:expr, $reason:expr) => {
        ::tracing::debug!(
            target: "recall::cache",
            event_type = "cache.validator_failed",
            validator = %$validator,
            path = %$path,
            reason = %$reason,
        )
    };
}

/// The result validator rejected a freshly computed value.
macro_rules! emit_result_invalid {
    ($function:expr, $path:expr, $reason:expr) => {
        ::tracing::warn!(
            target: "recall::cache",
            event_type = "cache.result_invalid",
            function = %$function,
            path = %$path,
            reason = %$reason,
        )
    };
}

/// An output entry was persisted.
macro_rules! emit_cache_stored {
    ($function:expr, $path:expr, $bytes:expr) => {
        ::tracing::debug!(
            target: "recall::cache",
            event_type = "cache.stored",
            function = %$function,
            path = %$path,
            bytes = $bytes,
        )
    };
}

pub(crate) use emit_cache_hit;
pub(crate) use emit_cache_miss;
pub(crate) use emit_cache_stored;
pub(crate) use emit_result_invalid;
pub(crate) use emit_validator_failed;
