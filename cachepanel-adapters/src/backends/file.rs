//! Filesystem adapter: one hashed entry file per key.
//!
//! Each entry lives in its own file named by the SHA-256 of the storage
//! key, so the original key name cannot be recovered from the directory
//! listing. That is why this adapter declares no `query` ability: the
//! filenames are one-way. `flush` removes every entry file in the
//! directory, so give each instance its own directory rather than sharing
//! one.
//!
//! The entry format is a small JSON envelope holding the expiry deadline
//! (unix milliseconds) and the raw value bytes. Expired entries are
//! deleted on the read that discovers them.

use crate::adapter::{backend_error, conflict, not_found, CacheAdapter};
use crate::backends::deadline;
use crate::keyspace::KeySpace;
use cachepanel_core::{
    AbilitySet, CacheInstance, CacheValue, ConfigError, KeyRecord, Operation, PageRequest,
    PanelError, PanelResult, Pattern, SearchResult,
};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENTRY_EXTENSION: &str = "entry";

/// On-disk representation of one cache entry.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    /// Expiry deadline in unix milliseconds, absent for non-expiring keys.
    expires_at: Option<i64>,
    value: Vec<u8>,
}

impl Envelope {
    fn new(value: &CacheValue, ttl: Option<Duration>) -> Self {
        Self {
            expires_at: deadline(ttl).map(|at| at.timestamp_millis()),
            value: value.to_storage_bytes(),
        }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(millis) => match Utc.timestamp_millis_opt(millis).single() {
                Some(at) => at <= now,
                // An undecodable deadline is treated as already expired.
                None => true,
            },
            None => false,
        }
    }
}

/// Adapter for file-based caches.
pub struct FileAdapter {
    cache_name: String,
    abilities: AbilitySet,
    keyspace: KeySpace,
    dir: PathBuf,
}

impl FileAdapter {
    pub const BACKEND_NAME: &'static str = "file";

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
                reason: "the file backend requires a location (cache directory)".to_string(),
            })
        })?;
        let dir = PathBuf::from(location);
        fs::create_dir_all(&dir).map_err(|e| {
            PanelError::from(ConfigError::InvalidInstance {
                cache: cache_name.to_string(),
                reason: format!("cannot create cache directory '{}': {e}", dir.display()),
            })
        })?;
        Ok(Self {
            cache_name: cache_name.to_string(),
            abilities,
            keyspace: KeySpace::from_instance(instance),
            dir,
        })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(self.keyspace.storage_key(key).as_bytes());
        self.dir
            .join(hex::encode(digest))
            .with_extension(ENTRY_EXTENSION)
    }

    /// Read and decode the entry at `path`, deleting it when expired.
    /// `Ok(None)` means the key is absent or expired.
    fn read_entry(&self, path: &Path, operation: Operation) -> PanelResult<Option<Envelope>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(backend_error(&self.cache_name, operation, e)),
        };
        let envelope: Envelope = serde_json::from_slice(&bytes)
            .map_err(|e| backend_error(&self.cache_name, operation, e))?;
        if envelope.is_expired(Utc::now()) {
            self.remove_entry(path, operation)?;
            return Ok(None);
        }
        Ok(Some(envelope))
    }

    fn write_entry(&self, path: &Path, envelope: &Envelope, operation: Operation) -> PanelResult<()> {
        let bytes = serde_json::to_vec(envelope)
            .map_err(|e| backend_error(&self.cache_name, operation, e))?;
        fs::write(path, bytes).map_err(|e| backend_error(&self.cache_name, operation, e))
    }

    fn remove_entry(&self, path: &Path, operation: Operation) -> PanelResult<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            // Lost a race with another panel or the host application.
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(backend_error(&self.cache_name, operation, e)),
        }
    }
}

impl CacheAdapter for FileAdapter {
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
        // Entry filenames are hashes; key names are unrecoverable. The gate
        // below always fails unless an override forced `query` on a custom
        // registration, in which case the structural denial still holds.
        self.ensure(Operation::Query)?;
        Err(PanelError::CapabilityDenied {
            cache: self.cache_name.clone(),
            operation: Operation::Query,
        })
    }

    fn get(&mut self, key: &str) -> PanelResult<KeyRecord> {
        self.ensure(Operation::Get)?;
        let path = self.entry_path(key);
        match self.read_entry(&path, Operation::Get)? {
            Some(envelope) => Ok(
                KeyRecord::new(key, CacheValue::from_stored_bytes(&envelope.value))
                    .with_storage_key(self.keyspace.storage_key(key)),
            ),
            None => Err(not_found(&self.cache_name, key)),
        }
    }

    fn add(&mut self, key: &str, value: &CacheValue, ttl: Option<Duration>) -> PanelResult<()> {
        self.ensure(Operation::Add)?;
        let path = self.entry_path(key);
        // An expired occupant does not block the create.
        if self.read_entry(&path, Operation::Add)?.is_some() {
            return Err(conflict(&self.cache_name, key));
        }
        let envelope = Envelope::new(value, ttl);
        let bytes = serde_json::to_vec(&envelope)
            .map_err(|e| backend_error(&self.cache_name, Operation::Add, e))?;
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(conflict(&self.cache_name, key));
            }
            Err(e) => return Err(backend_error(&self.cache_name, Operation::Add, e)),
        };
        file.write_all(&bytes)
            .map_err(|e| backend_error(&self.cache_name, Operation::Add, e))
    }

    fn edit(&mut self, key: &str, value: &CacheValue, ttl: Option<Duration>) -> PanelResult<()> {
        self.ensure(Operation::Edit)?;
        let path = self.entry_path(key);
        if self.read_entry(&path, Operation::Edit)?.is_none() {
            return Err(not_found(&self.cache_name, key));
        }
        self.write_entry(&path, &Envelope::new(value, ttl), Operation::Edit)
    }

    fn delete(&mut self, key: &str) -> PanelResult<()> {
        self.ensure(Operation::Delete)?;
        let path = self.entry_path(key);
        if self.read_entry(&path, Operation::Delete)?.is_none() {
            return Err(not_found(&self.cache_name, key));
        }
        self.remove_entry(&path, Operation::Delete)
    }

    fn flush(&mut self) -> PanelResult<()> {
        self.ensure(Operation::Flush)?;
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| backend_error(&self.cache_name, Operation::Flush, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| backend_error(&self.cache_name, Operation::Flush, e))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(ENTRY_EXTENSION) {
                self.remove_entry(&path, Operation::Flush)?;
            }
        }
        Ok(())
    }
}
