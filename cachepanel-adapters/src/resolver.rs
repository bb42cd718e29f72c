//! Instance resolution: configuration + registry -> live adapters.
//!
//! The resolver validates the whole configuration up front. A replacement
//! backend mapping that names an unregistered adapter, an ability override
//! for a cache that does not exist, or an override that widens past what
//! the variant structurally supports all fail construction; the panel
//! never runs with an ambiguous capability set. Backends nothing claims
//! fall back to the noop adapter and deny everything.

use crate::adapter::CacheAdapter;
use crate::registry::{AdapterRegistry, AdapterSpec};
use cachepanel_core::{
    AbilityOverride, AbilitySet, CacheInstance, ConfigError, PanelConfig, PanelResult,
};
use std::sync::Arc;

/// Listing entry for one configured cache: identity plus effective
/// abilities, computed without opening a backend connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceInfo {
    /// Configured cache name.
    pub name: String,
    /// Backend class identifier as configured.
    pub backend: String,
    /// Short name of the adapter variant that claims the backend.
    pub adapter: String,
    pub abilities: AbilitySet,
}

/// Resolves configured cache names to adapters.
pub struct Resolver {
    config: PanelConfig,
    registry: AdapterRegistry,
}

impl Resolver {
    pub fn new(config: PanelConfig, registry: AdapterRegistry) -> Result<Self, ConfigError> {
        for (backend, identifier) in &config.overrides.backends {
            if !registry.contains(identifier) {
                tracing::error!(
                    backend,
                    adapter = identifier,
                    "backend override names an unregistered adapter"
                );
                return Err(ConfigError::UnknownAdapter {
                    identifier: identifier.clone(),
                });
            }
        }
        let resolver = Self { config, registry };
        for (cache, overrides) in &resolver.config.overrides.abilities {
            let Some(instance) = resolver.config.instance(cache) else {
                tracing::error!(cache, "ability override names an unconfigured cache");
                return Err(ConfigError::UnknownCache {
                    name: cache.clone(),
                });
            };
            let spec = resolver.spec_for(instance);
            let declared = spec.declared_abilities();
            if let Some(operation) = declared.first_widened(&declared.merge(overrides)) {
                tracing::error!(
                    cache,
                    backend = spec.name(),
                    operation = %operation,
                    "ability override widens past the adapter's declared set"
                );
                return Err(ConfigError::ImpossibleAbility {
                    cache: cache.clone(),
                    backend: spec.name().to_string(),
                    operation,
                });
            }
        }
        Ok(resolver)
    }

    pub fn from_toml_str(input: &str, registry: AdapterRegistry) -> Result<Self, ConfigError> {
        Self::new(PanelConfig::from_toml_str(input)?, registry)
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    fn spec_for(&self, instance: &CacheInstance) -> &Arc<AdapterSpec> {
        if let Some(identifier) = self.config.overrides.backends.get(&instance.backend) {
            // Validated at construction time.
            if let Some(spec) = self.registry.lookup(identifier) {
                return spec;
            }
        }
        self.registry
            .lookup(&instance.backend)
            .unwrap_or_else(|| self.registry.fallback())
    }

    fn override_for(&self, name: &str) -> AbilityOverride {
        self.config
            .overrides
            .abilities
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Effective abilities for one configured cache.
    fn effective_abilities(&self, name: &str, instance: &CacheInstance) -> AbilitySet {
        self.spec_for(instance)
            .declared_abilities()
            .merge(&self.override_for(name))
    }

    /// Open an adapter for the named cache with its effective abilities.
    pub fn resolve(&self, name: &str) -> PanelResult<Box<dyn CacheAdapter>> {
        let instance = self
            .config
            .instance(name)
            .ok_or(ConfigError::UnknownCache {
                name: name.to_string(),
            })?;
        let spec = self.spec_for(instance);
        let effective = spec
            .declared_abilities()
            .merge(&self.override_for(name));
        spec.build(name, instance, effective)
    }

    /// Every configured cache with its adapter identity and effective
    /// abilities. Never touches a backend.
    pub fn list_instances(&self) -> Vec<InstanceInfo> {
        self.config
            .caches
            .iter()
            .map(|(name, instance)| {
                let spec = self.spec_for(instance);
                InstanceInfo {
                    name: name.clone(),
                    backend: instance.backend.clone(),
                    adapter: spec.name().to_string(),
                    abilities: self.effective_abilities(name, instance),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachepanel_core::{Operation, PanelError};

    fn resolver(config: &str) -> Result<Resolver, ConfigError> {
        Resolver::from_toml_str(config, AdapterRegistry::builtin())
    }

    #[test]
    fn test_resolve_builtin_backend() {
        let resolver = resolver(
            r#"
            [caches.default]
            backend = "memory"
            location = "resolver-test-default"
            "#,
        )
        .expect("valid config");
        let adapter = resolver.resolve("default").expect("resolve");
        assert_eq!(adapter.backend_name(), "memory");
        assert!(adapter.supports(Operation::Flush));
    }

    #[test]
    fn test_unknown_cache_name() {
        let resolver = resolver("").expect("empty config is valid");
        let err = resolver.resolve("missing").map(|_| ()).expect_err("fail");
        assert_eq!(
            err,
            PanelError::Config(ConfigError::UnknownCache {
                name: "missing".to_string()
            })
        );
    }

    #[test]
    fn test_unrecognized_backend_falls_back_to_noop() {
        let resolver = resolver(
            r#"
            [caches.exotic]
            backend = "myco.TieredCache"
            "#,
        )
        .expect("valid config");
        let adapter = resolver.resolve("exotic").expect("resolve");
        assert_eq!(adapter.backend_name(), "noop");
        for op in Operation::ALL {
            assert!(!adapter.supports(op));
        }
    }

    #[test]
    fn test_backend_override_maps_custom_class() {
        let resolver = resolver(
            r#"
            [caches.exotic]
            backend = "myco.TieredCache"
            location = "resolver-test-exotic"

            [overrides.backends]
            "myco.TieredCache" = "memory"
            "#,
        )
        .expect("valid config");
        let adapter = resolver.resolve("exotic").expect("resolve");
        assert_eq!(adapter.backend_name(), "memory");
        assert!(adapter.supports(Operation::Query));
    }

    #[test]
    fn test_backend_override_to_unregistered_adapter_fails_eagerly() {
        let err = resolver(
            r#"
            [caches.exotic]
            backend = "myco.TieredCache"

            [overrides.backends]
            "myco.TieredCache" = "nonexistent"
            "#,
        )
        .map(|_| ())
        .expect_err("must fail");
        assert_eq!(
            err,
            ConfigError::UnknownAdapter {
                identifier: "nonexistent".to_string()
            }
        );
    }

    #[test]
    fn test_ability_override_for_unconfigured_cache_fails_eagerly() {
        let err = resolver(
            r#"
            [caches.default]
            backend = "memory"

            [overrides.abilities.ghost]
            flush = false
            "#,
        )
        .map(|_| ())
        .expect_err("must fail");
        assert_eq!(
            err,
            ConfigError::UnknownCache {
                name: "ghost".to_string()
            }
        );
    }

    #[test]
    fn test_widening_override_fails_eagerly() {
        let err = resolver(
            r#"
            [caches.files]
            backend = "file"
            location = "/tmp/ignored"

            [overrides.abilities.files]
            query = true
            "#,
        )
        .map(|_| ())
        .expect_err("must fail");
        assert_eq!(
            err,
            ConfigError::ImpossibleAbility {
                cache: "files".to_string(),
                backend: "file".to_string(),
                operation: Operation::Query,
            }
        );
    }

    #[test]
    fn test_narrowing_override_is_applied() {
        let resolver = resolver(
            r#"
            [caches.default]
            backend = "memory"
            location = "resolver-test-narrowed"

            [overrides.abilities.default]
            flush = false
            delete = false
            "#,
        )
        .expect("valid config");
        let mut adapter = resolver.resolve("default").expect("resolve");
        assert!(!adapter.supports(Operation::Flush));
        assert!(adapter.supports(Operation::Get));
        let err = adapter.flush().expect_err("flush denied");
        assert!(matches!(err, PanelError::CapabilityDenied { .. }));
    }

    #[test]
    fn test_list_instances_reports_effective_abilities() {
        let resolver = resolver(
            r#"
            [caches.default]
            backend = "memory"
            location = "resolver-test-list"

            [caches.exotic]
            backend = "myco.TieredCache"

            [overrides.abilities.default]
            flush = false
            "#,
        )
        .expect("valid config");
        let instances = resolver.list_instances();
        assert_eq!(instances.len(), 2);

        let default = &instances[0];
        assert_eq!(default.name, "default");
        assert_eq!(default.adapter, "memory");
        assert!(!default.abilities.flush);
        assert!(default.abilities.query);

        let exotic = &instances[1];
        assert_eq!(exotic.backend, "myco.TieredCache");
        assert_eq!(exotic.adapter, "noop");
        assert_eq!(exotic.abilities, AbilitySet::none());
    }
}
