//! Redis adapters: single-server and cluster variants.
//!
//! Both variants share one core. On a single server, listing walks `SCAN`
//! with a glob built from the keyspace prefix plus the search pattern, and
//! `flush` deletes by the same prefix-scoped scan rather than `FLUSHDB`,
//! so co-tenants of a shared database are never touched. `add`/`edit` use
//! `SET NX`/`SET XX` so create-only and replace-only semantics are atomic
//! server-side.
//!
//! The cluster client routes every command by key slot and `SCAN` has no
//! key, so the cluster variant declares `query` and `flush` false rather
//! than claim operations that would fail on a healthy cluster.
//!
//! A scan that stops early (enough matches for the requested page) reports
//! `total: None`; only a completed scan counts exactly.

use crate::adapter::{backend_error, conflict, not_found, CacheAdapter};
use crate::keyspace::KeySpace;
use cachepanel_core::{
    AbilitySet, CacheInstance, CacheValue, ConfigError, KeyRecord, Operation, PageRequest,
    PanelError, PanelResult, Pattern, SearchResult,
};
use redis::ConnectionLike;
use std::time::Duration;

const SCAN_COUNT: usize = 100;

/// Escape glob metacharacters so `text` matches literally in a `SCAN
/// MATCH` argument.
fn escape_glob(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '^' | '-' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

enum ClientKind {
    Single(redis::Client),
    Cluster(redis::cluster::ClusterClient),
}

struct RedisCore {
    cache_name: String,
    abilities: AbilitySet,
    keyspace: KeySpace,
    client: ClientKind,
}

impl RedisCore {
    fn open_single(
        cache_name: &str,
        instance: &CacheInstance,
        abilities: AbilitySet,
    ) -> PanelResult<Self> {
        let location = Self::require_location(cache_name, instance)?;
        let client = redis::Client::open(location).map_err(|e| {
            PanelError::from(ConfigError::InvalidInstance {
                cache: cache_name.to_string(),
                reason: format!("invalid redis url '{location}': {e}"),
            })
        })?;
        Ok(Self::assemble(cache_name, instance, abilities, ClientKind::Single(client)))
    }

    fn open_cluster(
        cache_name: &str,
        instance: &CacheInstance,
        abilities: AbilitySet,
    ) -> PanelResult<Self> {
        let location = Self::require_location(cache_name, instance)?;
        let nodes: Vec<String> = location
            .split(',')
            .map(|node| node.trim().to_string())
            .collect();
        let client = redis::cluster::ClusterClient::new(nodes).map_err(|e| {
            PanelError::from(ConfigError::InvalidInstance {
                cache: cache_name.to_string(),
                reason: format!("invalid redis cluster nodes '{location}': {e}"),
            })
        })?;
        Ok(Self::assemble(cache_name, instance, abilities, ClientKind::Cluster(client)))
    }

    fn require_location<'a>(
        cache_name: &str,
        instance: &'a CacheInstance,
    ) -> PanelResult<&'a str> {
        instance.location().ok_or_else(|| {
            PanelError::from(ConfigError::InvalidInstance {
                cache: cache_name.to_string(),
                reason: "the redis backend requires a location (server url)".to_string(),
            })
        })
    }

    fn assemble(
        cache_name: &str,
        instance: &CacheInstance,
        abilities: AbilitySet,
        client: ClientKind,
    ) -> Self {
        Self {
            cache_name: cache_name.to_string(),
            abilities,
            keyspace: KeySpace::from_instance(instance),
            client,
        }
    }

    fn connection(&self, operation: Operation) -> PanelResult<Box<dyn ConnectionLike>> {
        match &self.client {
            ClientKind::Single(client) => client
                .get_connection()
                .map(|conn| Box::new(conn) as Box<dyn ConnectionLike>)
                .map_err(|e| backend_error(&self.cache_name, operation, e)),
            ClientKind::Cluster(client) => client
                .get_connection()
                .map(|conn| Box::new(conn) as Box<dyn ConnectionLike>)
                .map_err(|e| backend_error(&self.cache_name, operation, e)),
        }
    }

    /// Walk SCAN until either the cursor closes or `stop_after` matching
    /// keys have been seen. Returns the matched user keys and whether the
    /// scan completed.
    fn scan_keys(
        &self,
        conn: &mut dyn ConnectionLike,
        glob: &str,
        stop_after: Option<usize>,
        operation: Operation,
    ) -> PanelResult<(Vec<String>, bool)> {
        let mut matched = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<Vec<u8>>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(glob)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query(conn)
                .map_err(|e| backend_error(&self.cache_name, operation, e))?;
            for raw in batch {
                let Ok(storage_key) = String::from_utf8(raw) else {
                    continue;
                };
                if let Some(key) = self.keyspace.user_key(&storage_key) {
                    matched.push(key);
                }
            }
            cursor = next;
            if cursor == 0 {
                matched.sort();
                matched.dedup();
                return Ok((matched, true));
            }
            if let Some(limit) = stop_after {
                // Duplicates are possible mid-scan; dedup before deciding
                // whether enough distinct keys have been seen.
                matched.sort();
                matched.dedup();
                if matched.len() > limit {
                    return Ok((matched, false));
                }
            }
        }
    }

    fn fetch_record(
        &self,
        conn: &mut dyn ConnectionLike,
        key: &str,
        operation: Operation,
    ) -> PanelResult<Option<KeyRecord>> {
        let storage_key = self.keyspace.storage_key(key);
        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(&storage_key)
            .query(conn)
            .map_err(|e| backend_error(&self.cache_name, operation, e))?;
        Ok(value.map(|bytes| {
            KeyRecord::new(key, CacheValue::from_stored_bytes(&bytes))
                .with_storage_key(storage_key)
        }))
    }

    fn query(&self, pattern: &Pattern, page: &PageRequest) -> PanelResult<SearchResult> {
        let glob = format!(
            "{}{}",
            escape_glob(&self.keyspace.storage_prefix()),
            pattern.to_redis_glob()
        );
        let mut conn = self.connection(Operation::Query)?;
        let wanted = page.offset() + page.per_page();
        let (matched, completed) =
            self.scan_keys(&mut *conn, &glob, Some(wanted), Operation::Query)?;

        let page_keys = matched
            .iter()
            .skip(page.offset())
            .take(page.per_page());
        let mut records = Vec::new();
        for key in page_keys {
            // Keys can vanish between the scan and the preview fetch.
            if let Some(record) = self.fetch_record(&mut *conn, key, Operation::Query)? {
                records.push(record);
            }
        }

        if completed {
            Ok(SearchResult::from_counted(records, matched.len(), page))
        } else {
            Ok(SearchResult::from_scan(
                records,
                None,
                matched.len() > wanted,
                page,
            ))
        }
    }

    fn get(&self, key: &str) -> PanelResult<KeyRecord> {
        let mut conn = self.connection(Operation::Get)?;
        self.fetch_record(&mut *conn, key, Operation::Get)?
            .ok_or_else(|| not_found(&self.cache_name, key))
    }

    fn write(
        &self,
        key: &str,
        value: &CacheValue,
        ttl: Option<Duration>,
        operation: Operation,
    ) -> PanelResult<()> {
        let storage_key = self.keyspace.storage_key(key);
        let mut cmd = redis::cmd("SET");
        cmd.arg(&storage_key).arg(value.to_storage_bytes());
        match operation {
            Operation::Add => cmd.arg("NX"),
            _ => cmd.arg("XX"),
        };
        if let Some(ttl) = ttl {
            let millis = ttl.as_millis().min(i64::MAX as u128).max(1) as i64;
            cmd.arg("PX").arg(millis);
        }
        let mut conn = self.connection(operation)?;
        let reply: Option<String> = cmd
            .query(&mut *conn)
            .map_err(|e| backend_error(&self.cache_name, operation, e))?;
        match reply {
            Some(_) => Ok(()),
            None if operation == Operation::Add => Err(conflict(&self.cache_name, key)),
            None => Err(not_found(&self.cache_name, key)),
        }
    }

    fn delete(&self, key: &str) -> PanelResult<()> {
        let storage_key = self.keyspace.storage_key(key);
        let mut conn = self.connection(Operation::Delete)?;
        let removed: i64 = redis::cmd("DEL")
            .arg(&storage_key)
            .query(&mut *conn)
            .map_err(|e| backend_error(&self.cache_name, Operation::Delete, e))?;
        if removed == 0 {
            return Err(not_found(&self.cache_name, key));
        }
        Ok(())
    }

    fn flush(&self) -> PanelResult<()> {
        let glob = format!("{}*", escape_glob(&self.keyspace.storage_prefix()));
        let mut conn = self.connection(Operation::Flush)?;
        let (keys, _) = self.scan_keys(&mut *conn, &glob, None, Operation::Flush)?;
        for chunk in keys.chunks(SCAN_COUNT) {
            let mut cmd = redis::cmd("DEL");
            for key in chunk {
                cmd.arg(self.keyspace.storage_key(key));
            }
            cmd.query::<i64>(&mut *conn)
                .map_err(|e| backend_error(&self.cache_name, Operation::Flush, e))?;
        }
        Ok(())
    }
}

/// Adapter for a single redis server.
pub struct RedisAdapter {
    core: RedisCore,
}

impl RedisAdapter {
    pub const BACKEND_NAME: &'static str = "redis";

    pub fn declared_abilities() -> AbilitySet {
        AbilitySet::all()
    }

    pub fn open(
        cache_name: &str,
        instance: &CacheInstance,
        abilities: AbilitySet,
    ) -> PanelResult<Self> {
        Ok(Self {
            core: RedisCore::open_single(cache_name, instance, abilities)?,
        })
    }
}

impl CacheAdapter for RedisAdapter {
    fn cache_name(&self) -> &str {
        &self.core.cache_name
    }

    fn backend_name(&self) -> &'static str {
        Self::BACKEND_NAME
    }

    fn abilities(&self) -> AbilitySet {
        self.core.abilities
    }

    fn query(&mut self, pattern: &Pattern, page: &PageRequest) -> PanelResult<SearchResult> {
        self.ensure(Operation::Query)?;
        self.core.query(pattern, page)
    }

    fn get(&mut self, key: &str) -> PanelResult<KeyRecord> {
        self.ensure(Operation::Get)?;
        self.core.get(key)
    }

    fn add(&mut self, key: &str, value: &CacheValue, ttl: Option<Duration>) -> PanelResult<()> {
        self.ensure(Operation::Add)?;
        self.core.write(key, value, ttl, Operation::Add)
    }

    fn edit(&mut self, key: &str, value: &CacheValue, ttl: Option<Duration>) -> PanelResult<()> {
        self.ensure(Operation::Edit)?;
        self.core.write(key, value, ttl, Operation::Edit)
    }

    fn delete(&mut self, key: &str) -> PanelResult<()> {
        self.ensure(Operation::Delete)?;
        self.core.delete(key)
    }

    fn flush(&mut self) -> PanelResult<()> {
        self.ensure(Operation::Flush)?;
        self.core.flush()
    }
}

/// Adapter for a redis cluster; the location is a comma-separated node
/// list.
///
/// The cluster client routes commands by key slot, and `SCAN` has no key
/// to route by, so listing and prefix-scoped flushing are structurally
/// unavailable here. The variant declares `query` and `flush` false;
/// search degrades to exact-key lookups the same way it does for
/// memcached and file caches.
pub struct RedisClusterAdapter {
    core: RedisCore,
}

impl RedisClusterAdapter {
    pub const BACKEND_NAME: &'static str = "redis+cluster";

    pub fn declared_abilities() -> AbilitySet {
        AbilitySet {
            query: false,
            flush: false,
            ..AbilitySet::all()
        }
    }

    pub fn open(
        cache_name: &str,
        instance: &CacheInstance,
        abilities: AbilitySet,
    ) -> PanelResult<Self> {
        Ok(Self {
            core: RedisCore::open_cluster(cache_name, instance, abilities)?,
        })
    }

    fn denied(&self, operation: Operation) -> PanelError {
        PanelError::CapabilityDenied {
            cache: self.core.cache_name.clone(),
            operation,
        }
    }
}

impl CacheAdapter for RedisClusterAdapter {
    fn cache_name(&self) -> &str {
        &self.core.cache_name
    }

    fn backend_name(&self) -> &'static str {
        Self::BACKEND_NAME
    }

    fn abilities(&self) -> AbilitySet {
        self.core.abilities
    }

    fn query(&mut self, _: &Pattern, _: &PageRequest) -> PanelResult<SearchResult> {
        // SCAN is unroutable in cluster mode; denied even if an override
        // on a custom registration forced the gate open.
        self.ensure(Operation::Query)?;
        Err(self.denied(Operation::Query))
    }

    fn get(&mut self, key: &str) -> PanelResult<KeyRecord> {
        self.ensure(Operation::Get)?;
        self.core.get(key)
    }

    fn add(&mut self, key: &str, value: &CacheValue, ttl: Option<Duration>) -> PanelResult<()> {
        self.ensure(Operation::Add)?;
        self.core.write(key, value, ttl, Operation::Add)
    }

    fn edit(&mut self, key: &str, value: &CacheValue, ttl: Option<Duration>) -> PanelResult<()> {
        self.ensure(Operation::Edit)?;
        self.core.write(key, value, ttl, Operation::Edit)
    }

    fn delete(&mut self, key: &str) -> PanelResult<()> {
        self.ensure(Operation::Delete)?;
        self.core.delete(key)
    }

    fn flush(&mut self) -> PanelResult<()> {
        // Flushing a keyspace needs the same scan; see `query`.
        self.ensure(Operation::Flush)?;
        Err(self.denied(Operation::Flush))
    }
}
