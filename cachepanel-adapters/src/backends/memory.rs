//! In-memory adapter over process-wide named stores.
//!
//! Configured in-memory caches live for the process lifetime, so the store
//! table is process-wide: every adapter resolved against the same location
//! shares one store, the way a host application's local-memory cache would
//! behave. Instances without an explicit location get a store private to
//! their cache name.
//!
//! Entries expire lazily: reads and listings treat a past-deadline entry as
//! absent, and writes purge it.

use crate::adapter::{conflict, not_found, CacheAdapter};
use crate::backends::deadline;
use crate::keyspace::KeySpace;
use cachepanel_core::{
    paginate, AbilitySet, CacheInstance, CacheValue, KeyRecord, Operation, PageRequest,
    PanelResult, Pattern, SearchResult,
};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Duration;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// Keys are stored under the full storage transform, sorted by the map.
type Store = Arc<RwLock<BTreeMap<String, Entry>>>;

static STORES: Lazy<RwLock<HashMap<String, Store>>> = Lazy::new(Default::default);

fn store_for(location: &str) -> Store {
    let stores = STORES.read().unwrap_or_else(|e| e.into_inner());
    if let Some(store) = stores.get(location) {
        return store.clone();
    }
    drop(stores);
    let mut stores = STORES.write().unwrap_or_else(|e| e.into_inner());
    stores
        .entry(location.to_string())
        .or_insert_with(|| Arc::new(RwLock::new(BTreeMap::new())))
        .clone()
}

/// Adapter for in-process memory caches.
pub struct MemoryAdapter {
    cache_name: String,
    abilities: AbilitySet,
    keyspace: KeySpace,
    store: Store,
}

impl MemoryAdapter {
    pub const BACKEND_NAME: &'static str = "memory";

    pub fn declared_abilities() -> AbilitySet {
        AbilitySet::all()
    }

    pub fn open(
        cache_name: &str,
        instance: &CacheInstance,
        abilities: AbilitySet,
    ) -> PanelResult<Self> {
        let location = instance.location().unwrap_or(cache_name);
        Ok(Self {
            cache_name: cache_name.to_string(),
            abilities,
            keyspace: KeySpace::from_instance(instance),
            store: store_for(location),
        })
    }

    fn record(&self, key: &str, entry: &Entry) -> KeyRecord {
        KeyRecord::new(key, CacheValue::from_stored_bytes(&entry.value))
            .with_storage_key(self.keyspace.storage_key(key))
    }
}

impl CacheAdapter for MemoryAdapter {
    fn cache_name(&self) -> &str {
        &self.cache_name
    }

    fn backend_name(&self) -> &'static str {
        Self::BACKEND_NAME
    }

    fn abilities(&self) -> AbilitySet {
        self.abilities
    }

    fn query(&mut self, pattern: &Pattern, page: &PageRequest) -> PanelResult<SearchResult> {
        self.ensure(Operation::Query)?;
        let now = Utc::now();
        let map = self.store.read().unwrap_or_else(|e| e.into_inner());
        let matched: Vec<(String, Entry)> = map
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .filter_map(|(storage_key, entry)| {
                self.keyspace
                    .user_key(storage_key)
                    .filter(|key| pattern.matches(key))
                    .map(|key| (key, entry.clone()))
            })
            .collect();
        drop(map);

        let (page_items, total) = paginate(matched, page);
        let records = page_items
            .iter()
            .map(|(key, entry)| self.record(key, entry))
            .collect();
        Ok(SearchResult::from_counted(records, total, page))
    }

    fn get(&mut self, key: &str) -> PanelResult<KeyRecord> {
        self.ensure(Operation::Get)?;
        let storage_key = self.keyspace.storage_key(key);
        let map = self.store.read().unwrap_or_else(|e| e.into_inner());
        match map.get(&storage_key) {
            Some(entry) if !entry.is_expired(Utc::now()) => Ok(self.record(key, entry)),
            _ => Err(not_found(&self.cache_name, key)),
        }
    }

    fn add(&mut self, key: &str, value: &CacheValue, ttl: Option<Duration>) -> PanelResult<()> {
        self.ensure(Operation::Add)?;
        let storage_key = self.keyspace.storage_key(key);
        let now = Utc::now();
        let mut map = self.store.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = map.get(&storage_key) {
            if !entry.is_expired(now) {
                return Err(conflict(&self.cache_name, key));
            }
        }
        map.insert(
            storage_key,
            Entry {
                value: value.to_storage_bytes(),
                expires_at: deadline(ttl),
            },
        );
        Ok(())
    }

    fn edit(&mut self, key: &str, value: &CacheValue, ttl: Option<Duration>) -> PanelResult<()> {
        self.ensure(Operation::Edit)?;
        let storage_key = self.keyspace.storage_key(key);
        let now = Utc::now();
        let mut map = self.store.write().unwrap_or_else(|e| e.into_inner());
        match map.get_mut(&storage_key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.value = value.to_storage_bytes();
                entry.expires_at = deadline(ttl);
                Ok(())
            }
            _ => Err(not_found(&self.cache_name, key)),
        }
    }

    fn delete(&mut self, key: &str) -> PanelResult<()> {
        self.ensure(Operation::Delete)?;
        let storage_key = self.keyspace.storage_key(key);
        let mut map = self.store.write().unwrap_or_else(|e| e.into_inner());
        match map.remove(&storage_key) {
            Some(entry) if !entry.is_expired(Utc::now()) => Ok(()),
            _ => Err(not_found(&self.cache_name, key)),
        }
    }

    fn flush(&mut self) -> PanelResult<()> {
        self.ensure(Operation::Flush)?;
        let prefix = self.keyspace.storage_prefix();
        let mut map = self.store.write().unwrap_or_else(|e| e.into_inner());
        map.retain(|storage_key, _| !storage_key.starts_with(&prefix));
        Ok(())
    }
}
