//! The adapter contract: six capability-gated operations over one cache.

use cachepanel_core::{
    AbilitySet, CacheValue, KeyRecord, Operation, PageRequest, PanelError, PanelResult, Pattern,
    SearchResult,
};
use std::fmt;
use std::time::Duration;

/// One configured cache instance's view of its backend.
///
/// Adapters are constructed on demand by the resolver and are stateless
/// between calls: no operation depends on a prior operation's in-memory
/// side effect, and concurrent mutation of the backend surfaces as a
/// normal NotFound/Conflict result. Every operation self-gates on the
/// effective ability set via [`CacheAdapter::ensure`] before any backend
/// call.
pub trait CacheAdapter {
    /// The configured instance name this adapter serves.
    fn cache_name(&self) -> &str;

    /// Short identifier of the adapter variant (e.g. `"redis"`).
    fn backend_name(&self) -> &'static str;

    /// The effective ability set, after operator overrides.
    fn abilities(&self) -> AbilitySet;

    fn supports(&self, operation: Operation) -> bool {
        self.abilities().supports(operation)
    }

    /// Capability gate: refuse unsupported operations before touching the
    /// backend.
    fn ensure(&self, operation: Operation) -> PanelResult<()> {
        if self.supports(operation) {
            Ok(())
        } else {
            Err(PanelError::CapabilityDenied {
                cache: self.cache_name().to_string(),
                operation,
            })
        }
    }

    /// Wildcard key listing with pagination and value previews.
    fn query(&mut self, pattern: &Pattern, page: &PageRequest) -> PanelResult<SearchResult>;

    /// Exact-key read.
    fn get(&mut self, key: &str) -> PanelResult<KeyRecord>;

    /// Create a key that must not exist yet. Strictly create-only: an
    /// occupied key is a Conflict, using the backend's atomic create
    /// primitive where one exists.
    fn add(&mut self, key: &str, value: &CacheValue, ttl: Option<Duration>) -> PanelResult<()>;

    /// Replace the value (and TTL) of an existing key.
    fn edit(&mut self, key: &str, value: &CacheValue, ttl: Option<Duration>) -> PanelResult<()>;

    /// Remove one key. Deleting an absent key is NotFound, not an error.
    fn delete(&mut self, key: &str) -> PanelResult<()>;

    /// Remove every key the instance owns.
    fn flush(&mut self) -> PanelResult<()>;
}

/// Wrap a backend client failure with operator-actionable context and log
/// it. Value contents are never logged.
pub(crate) fn backend_error(
    cache: &str,
    operation: Operation,
    err: impl fmt::Display,
) -> PanelError {
    let message = err.to_string();
    tracing::error!(
        cache,
        operation = %operation,
        error = %message,
        "cache backend operation failed"
    );
    PanelError::Backend {
        cache: cache.to_string(),
        operation,
        message,
    }
}

pub(crate) fn not_found(cache: &str, key: &str) -> PanelError {
    PanelError::NotFound {
        cache: cache.to_string(),
        key: key.to_string(),
    }
}

pub(crate) fn conflict(cache: &str, key: &str) -> PanelError {
    PanelError::Conflict {
        cache: cache.to_string(),
        key: key.to_string(),
    }
}
