//! Database adapter over a SQLite cache table.
//!
//! One row per key: `(key TEXT PRIMARY KEY, value BLOB, expires_at
//! INTEGER)`, with the deadline in unix milliseconds and `NULL` meaning
//! no expiry. The table is created on open when absent. Every statement
//! filters expired rows, so a stale row behaves exactly like an absent
//! one until a write purges it.

use crate::adapter::{backend_error, conflict, not_found, CacheAdapter};
use crate::backends::deadline;
use crate::keyspace::KeySpace;
use cachepanel_core::{
    AbilitySet, CacheInstance, CacheValue, ConfigError, KeyRecord, Operation, PageRequest,
    PanelError, PanelResult, Pattern, SearchResult,
};
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::time::Duration;

const DEFAULT_TABLE: &str = "cache_entries";

/// Escape LIKE metacharacters so `text` matches literally under
/// `ESCAPE '\'`.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Table names are interpolated into SQL, so they are restricted to plain
/// identifiers.
fn validate_table(cache_name: &str, table: &str) -> Result<(), PanelError> {
    let mut chars = table.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(PanelError::from(ConfigError::InvalidInstance {
            cache: cache_name.to_string(),
            reason: format!("'{table}' is not a valid cache table name"),
        }))
    }
}

/// Adapter for database-backed caches.
pub struct DatabaseAdapter {
    cache_name: String,
    abilities: AbilitySet,
    keyspace: KeySpace,
    conn: Connection,
    table: String,
}

impl DatabaseAdapter {
    pub const BACKEND_NAME: &'static str = "database";

    pub fn declared_abilities() -> AbilitySet {
        AbilitySet::all()
    }

    pub fn open(
        cache_name: &str,
        instance: &CacheInstance,
        abilities: AbilitySet,
    ) -> PanelResult<Self> {
        let location = instance.location().ok_or_else(|| {
            PanelError::from(ConfigError::InvalidInstance {
                cache: cache_name.to_string(),
                reason: "the database backend requires a location (database path)".to_string(),
            })
        })?;
        let table = instance.option("table").unwrap_or(DEFAULT_TABLE).to_string();
        validate_table(cache_name, &table)?;
        let conn = Connection::open(location).map_err(|e| {
            PanelError::from(ConfigError::InvalidInstance {
                cache: cache_name.to_string(),
                reason: format!("cannot open database '{location}': {e}"),
            })
        })?;
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                     key TEXT PRIMARY KEY,
                     value BLOB NOT NULL,
                     expires_at INTEGER
                 )"
            ),
            [],
        )
        .map_err(|e| {
            PanelError::from(ConfigError::InvalidInstance {
                cache: cache_name.to_string(),
                reason: format!("cannot prepare cache table '{table}': {e}"),
            })
        })?;
        Ok(Self {
            cache_name: cache_name.to_string(),
            abilities,
            keyspace: KeySpace::from_instance(instance),
            conn,
            table,
        })
    }

    fn now_millis() -> i64 {
        Utc::now().timestamp_millis()
    }

    fn expires_millis(ttl: Option<Duration>) -> Option<i64> {
        deadline(ttl).map(|at| at.timestamp_millis())
    }

    /// Remove an expired occupant so `add` can take the slot.
    fn purge_expired(&self, storage_key: &str, operation: Operation) -> PanelResult<()> {
        self.conn
            .execute(
                &format!(
                    "DELETE FROM {} WHERE key = ?1
                         AND expires_at IS NOT NULL AND expires_at <= ?2",
                    self.table
                ),
                params![storage_key, Self::now_millis()],
            )
            .map(|_| ())
            .map_err(|e| backend_error(&self.cache_name, operation, e))
    }
}

impl CacheAdapter for DatabaseAdapter {
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
        let like = format!(
            "{}{}",
            escape_like(&self.keyspace.storage_prefix()),
            pattern.to_sql_like()
        );
        let now = Self::now_millis();

        let total: usize = self
            .conn
            .query_row(
                &format!(
                    r"SELECT COUNT(*) FROM {} WHERE key LIKE ?1 ESCAPE '\'
                          AND (expires_at IS NULL OR expires_at > ?2)",
                    self.table
                ),
                params![like, now],
                |row| row.get::<_, i64>(0),
            )
            .map_err(|e| backend_error(&self.cache_name, Operation::Query, e))?
            as usize;

        let mut stmt = self
            .conn
            .prepare(&format!(
                r"SELECT key, value FROM {} WHERE key LIKE ?1 ESCAPE '\'
                      AND (expires_at IS NULL OR expires_at > ?2)
                      ORDER BY key LIMIT ?3 OFFSET ?4",
                self.table
            ))
            .map_err(|e| backend_error(&self.cache_name, Operation::Query, e))?;
        let rows = stmt
            .query_map(
                params![like, now, page.per_page() as i64, page.offset() as i64],
                |row| {
                    let storage_key: String = row.get(0)?;
                    let value: Vec<u8> = row.get(1)?;
                    Ok((storage_key, value))
                },
            )
            .map_err(|e| backend_error(&self.cache_name, Operation::Query, e))?;

        let mut records = Vec::new();
        for row in rows {
            let (storage_key, value) =
                row.map_err(|e| backend_error(&self.cache_name, Operation::Query, e))?;
            if let Some(key) = self.keyspace.user_key(&storage_key) {
                records.push(
                    KeyRecord::new(key, CacheValue::from_stored_bytes(&value))
                        .with_storage_key(storage_key),
                );
            }
        }
        Ok(SearchResult::from_counted(records, total, page))
    }

    fn get(&mut self, key: &str) -> PanelResult<KeyRecord> {
        self.ensure(Operation::Get)?;
        let storage_key = self.keyspace.storage_key(key);
        let value: Option<Vec<u8>> = self
            .conn
            .query_row(
                &format!(
                    "SELECT value FROM {} WHERE key = ?1
                         AND (expires_at IS NULL OR expires_at > ?2)",
                    self.table
                ),
                params![storage_key, Self::now_millis()],
                |row| row.get(0),
            )
            .optional()
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
        self.purge_expired(&storage_key, Operation::Add)?;
        let result = self.conn.execute(
            &format!(
                "INSERT INTO {} (key, value, expires_at) VALUES (?1, ?2, ?3)",
                self.table
            ),
            params![
                storage_key,
                value.to_storage_bytes(),
                Self::expires_millis(ttl)
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(conflict(&self.cache_name, key))
            }
            Err(e) => Err(backend_error(&self.cache_name, Operation::Add, e)),
        }
    }

    fn edit(&mut self, key: &str, value: &CacheValue, ttl: Option<Duration>) -> PanelResult<()> {
        self.ensure(Operation::Edit)?;
        let storage_key = self.keyspace.storage_key(key);
        let changed = self
            .conn
            .execute(
                &format!(
                    "UPDATE {} SET value = ?2, expires_at = ?3 WHERE key = ?1
                         AND (expires_at IS NULL OR expires_at > ?4)",
                    self.table
                ),
                params![
                    storage_key,
                    value.to_storage_bytes(),
                    Self::expires_millis(ttl),
                    Self::now_millis()
                ],
            )
            .map_err(|e| backend_error(&self.cache_name, Operation::Edit, e))?;
        if changed == 0 {
            return Err(not_found(&self.cache_name, key));
        }
        Ok(())
    }

    fn delete(&mut self, key: &str) -> PanelResult<()> {
        self.ensure(Operation::Delete)?;
        let storage_key = self.keyspace.storage_key(key);
        let changed = self
            .conn
            .execute(
                &format!(
                    "DELETE FROM {} WHERE key = ?1
                         AND (expires_at IS NULL OR expires_at > ?2)",
                    self.table
                ),
                params![storage_key, Self::now_millis()],
            )
            .map_err(|e| backend_error(&self.cache_name, Operation::Delete, e))?;
        if changed == 0 {
            return Err(not_found(&self.cache_name, key));
        }
        Ok(())
    }

    fn flush(&mut self) -> PanelResult<()> {
        self.ensure(Operation::Flush)?;
        let like = format!("{}%", escape_like(&self.keyspace.storage_prefix()));
        self.conn
            .execute(
                &format!(r"DELETE FROM {} WHERE key LIKE ?1 ESCAPE '\'", self.table),
                params![like],
            )
            .map(|_| ())
            .map_err(|e| backend_error(&self.cache_name, Operation::Flush, e))
    }
}
