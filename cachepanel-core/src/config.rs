//! Operator configuration: named cache instances and overrides.
//!
//! Configuration is read once at process start and injected wholesale into
//! the resolver. It is never mutated afterwards; reconfiguration means
//! re-reading and rebuilding, not patching.

use crate::ability::AbilityOverride;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One operator-declared cache instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInstance {
    /// Backend class identifier, resolved through the adapter registry.
    pub backend: String,
    /// Connection parameter: a URL, directory, or database path, depending
    /// on the backend.
    #[serde(default)]
    pub location: Option<String>,
    /// Prefix folded into every storage key.
    #[serde(default)]
    pub key_prefix: String,
    /// Version folded into every storage key.
    #[serde(default = "default_version")]
    pub version: i64,
    /// Backend-specific extras (e.g. `table` for the database adapter).
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

fn default_version() -> i64 {
    1
}

impl CacheInstance {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            location: None,
            key_prefix: String::new(),
            version: default_version(),
            options: BTreeMap::new(),
        }
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }
}

/// Operator-supplied overrides: replacement adapter mappings and per-cache
/// ability overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorOverrides {
    /// Backend class identifier -> registered adapter identifier.
    pub backends: BTreeMap<String, String>,
    /// Cache instance name -> ability override.
    pub abilities: BTreeMap<String, AbilityOverride>,
}

impl OperatorOverrides {
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty() && self.abilities.is_empty()
    }
}

/// Root configuration: the CACHES-equivalent mapping plus overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub caches: BTreeMap<String, CacheInstance>,
    pub overrides: OperatorOverrides,
}

impl PanelConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        toml::from_str(input).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })
    }

    pub fn instance(&self, name: &str) -> Option<&CacheInstance> {
        self.caches.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.caches.keys().map(String::as_str)
    }
}
