//! Memcached adapter.
//!
//! The memcached protocol has no key enumeration primitive, so this
//! adapter declares no `query` ability; search falls back to exact-key
//! lookups. Conflict and NotFound map directly onto the protocol's
//! `add`/`replace` command semantics, which are atomic server-side.

use crate::adapter::{backend_error, conflict, not_found, CacheAdapter};
use crate::keyspace::KeySpace;
use cachepanel_core::{
    AbilitySet, CacheInstance, CacheValue, ConfigError, KeyRecord, Operation, PageRequest,
    PanelError, PanelResult, Pattern, SearchResult,
};
use memcache::{CommandError, MemcacheError};
use std::time::Duration;

/// Adapter for memcached-backed caches.
pub struct MemcachedAdapter {
    cache_name: String,
    abilities: AbilitySet,
    keyspace: KeySpace,
    client: memcache::Client,
}

impl MemcachedAdapter {
    pub const BACKEND_NAME: &'static str = "memcached";

    pub fn declared_abilities() -> AbilitySet {
        AbilitySet::without_query()
    }

    pub fn open(
        cache_name: &str,
        instance: &CacheInstance,
        abilities: AbilitySet,
    ) -> PanelResult<Self> {
        let location = instance.location().ok_or_else(|| {
            PanelError::from(ConfigError::InvalidInstance {
                cache: cache_name.to_string(),
                reason: "the memcached backend requires a location (server url)".to_string(),
            })
        })?;
        let client = memcache::Client::connect(location).map_err(|e| {
            PanelError::from(ConfigError::InvalidInstance {
                cache: cache_name.to_string(),
                reason: format!("cannot connect to memcached at '{location}': {e}"),
            })
        })?;
        Ok(Self {
            cache_name: cache_name.to_string(),
            abilities,
            keyspace: KeySpace::from_instance(instance),
            client,
        })
    }

    /// Memcached expirations are whole seconds; `0` means no expiry.
    fn expiration(ttl: Option<Duration>) -> u32 {
        ttl.map(|t| t.as_secs().min(u32::MAX as u64) as u32)
            .unwrap_or(0)
    }
}

impl CacheAdapter for MemcachedAdapter {
    fn cache_name(&self) -> &str {
        &self.cache_name
    }

    fn backend_name(&self) -> &'static str {
        Self::BACKEND_NAME
    }

    fn abilities(&self) -> AbilitySet {
        self.abilities
    }

    fn query(&mut self, _: &Pattern, _: &PageRequest) -> PanelResult<SearchResult> {
        // The protocol cannot list keys, so the gate below always fails
        // unless an override forced `query` on; the structural denial
        // still holds in that case.
        self.ensure(Operation::Query)?;
        Err(PanelError::CapabilityDenied {
            cache: self.cache_name.clone(),
            operation: Operation::Query,
        })
    }

    fn get(&mut self, key: &str) -> PanelResult<KeyRecord> {
        self.ensure(Operation::Get)?;
        let storage_key = self.keyspace.storage_key(key);
        let value: Option<Vec<u8>> = self
            .client
            .get(&storage_key)
            .map_err(|e| backend_error(&self.cache_name, Operation::Get, e))?;
        match value {
            Some(bytes) => Ok(KeyRecord::new(key, CacheValue::from_stored_bytes(&bytes))
                .with_storage_key(storage_key)),
            None => Err(not_found(&self.cache_name, key)),
        }
    }

    fn add(&mut self, key: &str, value: &CacheValue, ttl: Option<Duration>) -> PanelResult<()> {
        self.ensure(Operation::Add)?;
        let storage_key = self.keyspace.storage_key(key);
        let bytes = value.to_storage_bytes();
        match self
            .client
            .add(&storage_key, &bytes[..], Self::expiration(ttl))
        {
            Ok(()) => Ok(()),
            Err(MemcacheError::CommandError(CommandError::KeyExists)) => {
                Err(conflict(&self.cache_name, key))
            }
            Err(e) => Err(backend_error(&self.cache_name, Operation::Add, e)),
        }
    }

    fn edit(&mut self, key: &str, value: &CacheValue, ttl: Option<Duration>) -> PanelResult<()> {
        self.ensure(Operation::Edit)?;
        let storage_key = self.keyspace.storage_key(key);
        let bytes = value.to_storage_bytes();
        match self
            .client
            .replace(&storage_key, &bytes[..], Self::expiration(ttl))
        {
            Ok(()) => Ok(()),
            Err(MemcacheError::CommandError(CommandError::KeyNotFound)) => {
                Err(not_found(&self.cache_name, key))
            }
            Err(e) => Err(backend_error(&self.cache_name, Operation::Edit, e)),
        }
    }

    fn delete(&mut self, key: &str) -> PanelResult<()> {
        self.ensure(Operation::Delete)?;
        let storage_key = self.keyspace.storage_key(key);
        let deleted = self
            .client
            .delete(&storage_key)
            .map_err(|e| backend_error(&self.cache_name, Operation::Delete, e))?;
        if deleted {
            Ok(())
        } else {
            Err(not_found(&self.cache_name, key))
        }
    }

    /// Memcached cannot enumerate or delete by prefix, so flush clears the
    /// whole server. Share a memcached server between instances only if
    /// that is acceptable.
    fn flush(&mut self) -> PanelResult<()> {
        self.ensure(Operation::Flush)?;
        self.client
            .flush()
            .map_err(|e| backend_error(&self.cache_name, Operation::Flush, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Connection-dependent behavior needs a live memcached server and is
    // covered by the protocol semantics above; these tests pin the offline
    // contract.

    #[test]
    fn test_declared_abilities_exclude_query() {
        let declared = MemcachedAdapter::declared_abilities();
        assert!(!declared.supports(Operation::Query));
        assert!(declared.supports(Operation::Get));
        assert!(declared.supports(Operation::Flush));
    }

    #[test]
    fn test_missing_location_is_invalid_instance() {
        let instance = CacheInstance::new(MemcachedAdapter::BACKEND_NAME);
        let err = MemcachedAdapter::open(
            "mc",
            &instance,
            MemcachedAdapter::declared_abilities(),
        )
        .map(|_| ())
        .expect_err("must fail");
        assert!(matches!(
            err,
            PanelError::Config(ConfigError::InvalidInstance { .. })
        ));
    }

    #[test]
    fn test_bad_location_is_invalid_instance() {
        let mut instance = CacheInstance::new(MemcachedAdapter::BACKEND_NAME);
        instance.location = Some("not a url".to_string());
        let err = MemcachedAdapter::open(
            "mc",
            &instance,
            MemcachedAdapter::declared_abilities(),
        )
        .map(|_| ())
        .expect_err("must fail");
        assert!(matches!(
            err,
            PanelError::Config(ConfigError::InvalidInstance { .. })
        ));
    }

    #[test]
    fn test_expiration_mapping() {
        assert_eq!(MemcachedAdapter::expiration(None), 0);
        assert_eq!(
            MemcachedAdapter::expiration(Some(Duration::from_secs(90))),
            90
        );
    }
}
