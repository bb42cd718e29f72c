//! Fallback adapter for unrecognized backends.
//!
//! When the registry cannot identify a backend class, the panel must not
//! guess at its capabilities. The noop adapter declares nothing and denies
//! everything, so an unrecognized cache still appears in listings but no
//! operation ever reaches a backend the panel does not understand.

use crate::adapter::CacheAdapter;
use cachepanel_core::{
    AbilitySet, CacheInstance, CacheValue, KeyRecord, Operation, PageRequest, PanelError,
    PanelResult, Pattern, SearchResult,
};
use std::time::Duration;

/// Adapter that denies every operation.
pub struct NoopAdapter {
    cache_name: String,
    abilities: AbilitySet,
}

impl NoopAdapter {
    pub const BACKEND_NAME: &'static str = "noop";

    pub fn declared_abilities() -> AbilitySet {
        AbilitySet::none()
    }

    pub fn open(
        cache_name: &str,
        _instance: &CacheInstance,
        abilities: AbilitySet,
    ) -> PanelResult<Self> {
        Ok(Self {
            cache_name: cache_name.to_string(),
            abilities,
        })
    }

    fn denied(&self, operation: Operation) -> PanelError {
        PanelError::CapabilityDenied {
            cache: self.cache_name.clone(),
            operation,
        }
    }
}

impl CacheAdapter for NoopAdapter {
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
        Err(self.denied(Operation::Query))
    }

    fn get(&mut self, _: &str) -> PanelResult<KeyRecord> {
        Err(self.denied(Operation::Get))
    }

    fn add(&mut self, _: &str, _: &CacheValue, _: Option<Duration>) -> PanelResult<()> {
        Err(self.denied(Operation::Add))
    }

    fn edit(&mut self, _: &str, _: &CacheValue, _: Option<Duration>) -> PanelResult<()> {
        Err(self.denied(Operation::Edit))
    }

    fn delete(&mut self, _: &str) -> PanelResult<()> {
        Err(self.denied(Operation::Delete))
    }

    fn flush(&mut self) -> PanelResult<()> {
        Err(self.denied(Operation::Flush))
    }
}
