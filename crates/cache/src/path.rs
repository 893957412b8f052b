//! Storage location of a cached function

use crate::signature::BoundArguments;
use std::fmt;
use std::sync::Arc;

/// Qualified identity of a cached function: `module.name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetId {
    module: String,
    name: String,
}

impl TargetId {
    /// Create an identity from a module path and function name
    #[must_use]
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }

    /// Module component
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Function name component
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `module.name`
    #[must_use]
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}

/// Identity of a function in the calling module, with `::` separators
/// rewritten to `.`.
///
/// ```
/// let id = recall_cache::target_id!(add);
/// assert_eq!(id.name(), "add");
/// ```
#[macro_export]
macro_rules! target_id {
    ($name:ident) => {
        $crate::TargetId::new(
            ::core::module_path!().replace("::", "."),
            ::core::stringify!($name),
        )
    };
}

/// Custom resolver: receives the identity and, during a call, the bound
/// arguments. Introspection calls pass `None`.
pub type PathFn = Arc<dyn Fn(&TargetId, Option<&BoundArguments>) -> String + Send + Sync>;

/// Maps a function identity to the directory holding its entries.
///
/// Resolution must be pure: the same identity always yields the same
/// path, which is what lets parent-directory creation be memoized.
#[derive(Clone)]
pub enum PathResolver {
    /// `prefix/module.name`, or `module.name` without a prefix
    Prefixed(Option<String>),
    /// Fully custom resolution
    Custom(PathFn),
}

impl PathResolver {
    /// Resolver under a normalized prefix
    #[must_use]
    pub fn prefixed(prefix: Option<&str>) -> Self {
        Self::Prefixed(prefix.map(normalize_prefix))
    }

    /// Resolve the directory for `target`
    #[must_use]
    pub fn resolve(&self, target: &TargetId, args: Option<&BoundArguments>) -> String {
        match self {
            Self::Prefixed(None) => target.qualified(),
            Self::Prefixed(Some(prefix)) => join(prefix, &target.qualified()),
            Self::Custom(f) => f(target, args),
        }
    }
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::Prefixed(None)
    }
}

impl fmt::Debug for PathResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prefixed(prefix) => f.debug_tuple("Prefixed").field(prefix).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Drop trailing separators, keeping a bare root as `/`.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() && prefix.starts_with('/') {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Join two `/`-separated segments without doubling the separator.
pub(crate) fn join(base: &str, child: &str) -> String {
    if base.is_empty() {
        child.to_string()
    } else if base.ends_with('/') {
        format!("{base}{child}")
    } else {
        format!("{base}/{child}")
    }
}
