//! Explicit backend-to-adapter registry.
//!
//! Each adapter variant is registered under a short identifier and under
//! its full type path, so configuration can name either. Lookups never
//! guess: a backend the registry does not know resolves to the noop
//! fallback, which denies everything.

use crate::adapter::CacheAdapter;
use crate::backends::{
    DatabaseAdapter, FileAdapter, MemcachedAdapter, MemoryAdapter, NoopAdapter, RedisAdapter,
    RedisClusterAdapter,
};
use cachepanel_core::{AbilitySet, CacheInstance, PanelResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type BuildFn =
    dyn Fn(&str, &CacheInstance, AbilitySet) -> PanelResult<Box<dyn CacheAdapter>> + Send + Sync;

/// One registered adapter variant: identifiers, declared abilities, and a
/// constructor.
pub struct AdapterSpec {
    name: String,
    type_path: String,
    declared: AbilitySet,
    build: Box<BuildFn>,
}

impl AdapterSpec {
    pub fn new(
        name: impl Into<String>,
        type_path: impl Into<String>,
        declared: AbilitySet,
        build: impl Fn(&str, &CacheInstance, AbilitySet) -> PanelResult<Box<dyn CacheAdapter>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            type_path: type_path.into(),
            declared,
            build: Box::new(build),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_path(&self) -> &str {
        &self.type_path
    }

    /// Abilities the variant supports structurally; overrides may narrow
    /// these but never widen them.
    pub fn declared_abilities(&self) -> AbilitySet {
        self.declared
    }

    pub fn build(
        &self,
        cache_name: &str,
        instance: &CacheInstance,
        effective: AbilitySet,
    ) -> PanelResult<Box<dyn CacheAdapter>> {
        (self.build)(cache_name, instance, effective)
    }
}

impl fmt::Debug for AdapterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterSpec")
            .field("name", &self.name)
            .field("type_path", &self.type_path)
            .field("declared", &self.declared)
            .finish_non_exhaustive()
    }
}

macro_rules! builtin_spec {
    ($adapter:ty) => {
        Arc::new(AdapterSpec::new(
            <$adapter>::BACKEND_NAME,
            concat!(
                "cachepanel_adapters::backends::",
                stringify!($adapter)
            ),
            <$adapter>::declared_abilities(),
            |cache_name, instance, effective| {
                <$adapter>::open(cache_name, instance, effective)
                    .map(|adapter| Box::new(adapter) as Box<dyn CacheAdapter>)
            },
        ))
    };
}

/// Identifier -> adapter spec mapping, plus the fail-closed fallback.
#[derive(Debug)]
pub struct AdapterRegistry {
    specs: HashMap<String, Arc<AdapterSpec>>,
    fallback: Arc<AdapterSpec>,
}

impl AdapterRegistry {
    /// Registry with every built-in variant, each reachable by short name
    /// and by type path.
    pub fn builtin() -> Self {
        let mut registry = Self {
            specs: HashMap::new(),
            fallback: builtin_spec!(NoopAdapter),
        };
        registry.register(builtin_spec!(MemoryAdapter));
        registry.register(builtin_spec!(RedisAdapter));
        registry.register(builtin_spec!(RedisClusterAdapter));
        registry.register(builtin_spec!(DatabaseAdapter));
        registry.register(builtin_spec!(FileAdapter));
        registry.register(builtin_spec!(MemcachedAdapter));
        registry.register(registry.fallback.clone());
        registry
    }

    /// Register a spec under both its identifiers. Later registrations
    /// shadow earlier ones, so hosts can replace a built-in.
    pub fn register(&mut self, spec: Arc<AdapterSpec>) {
        self.specs.insert(spec.name().to_string(), spec.clone());
        self.specs.insert(spec.type_path().to_string(), spec);
    }

    pub fn lookup(&self, identifier: &str) -> Option<&Arc<AdapterSpec>> {
        self.specs.get(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.specs.contains_key(identifier)
    }

    /// The noop spec used for backends nothing else claims.
    pub fn fallback(&self) -> &Arc<AdapterSpec> {
        &self.fallback
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
