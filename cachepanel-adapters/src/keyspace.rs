//! Storage-key transform shared by prefixing backends.
//!
//! Client libraries commonly fold an instance prefix and version into every
//! stored key. The panel applies the same `{prefix}:{version}:{key}`
//! transform so that the storage-level key can be shown alongside the
//! user-facing key name, and so that keys belonging to other instances in
//! a shared keyspace are never touched.

use cachepanel_core::CacheInstance;

/// The prefix/version namespace of one cache instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
    version: i64,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>, version: i64) -> Self {
        Self {
            prefix: prefix.into(),
            version,
        }
    }

    pub fn from_instance(instance: &CacheInstance) -> Self {
        Self::new(instance.key_prefix.clone(), instance.version)
    }

    /// The storage-level key: `{prefix}:{version}:{key}`.
    pub fn storage_key(&self, key: &str) -> String {
        format!("{}:{}:{}", self.prefix, self.version, key)
    }

    /// Prefix shared by every key in this keyspace.
    pub fn storage_prefix(&self) -> String {
        format!("{}:{}:", self.prefix, self.version)
    }

    /// Recover the user-facing key name; `None` for keys outside this
    /// keyspace.
    pub fn user_key(&self, storage_key: &str) -> Option<String> {
        storage_key
            .strip_prefix(&self.storage_prefix())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_shape() {
        let keyspace = KeySpace::new("sess", 2);
        assert_eq!(keyspace.storage_key("user:1"), "sess:2:user:1");
        assert_eq!(keyspace.storage_prefix(), "sess:2:");
    }

    #[test]
    fn test_empty_prefix_default_version() {
        let keyspace = KeySpace::new("", 1);
        assert_eq!(keyspace.storage_key("k"), ":1:k");
    }

    #[test]
    fn test_user_key_recovers_original() {
        let keyspace = KeySpace::new("app", 1);
        assert_eq!(
            keyspace.user_key("app:1:user:1"),
            Some("user:1".to_string())
        );
    }

    #[test]
    fn test_user_key_rejects_foreign_keys() {
        let keyspace = KeySpace::new("app", 1);
        assert_eq!(keyspace.user_key("other:1:user:1"), None);
        assert_eq!(keyspace.user_key("app:2:user:1"), None);
    }

    #[test]
    fn test_from_instance() {
        let mut instance = CacheInstance::new("redis");
        instance.key_prefix = "sess".to_string();
        instance.version = 3;
        let keyspace = KeySpace::from_instance(&instance);
        assert_eq!(keyspace.storage_key("k"), "sess:3:k");
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// The transform round-trips every key through its own keyspace.
        #[test]
        fn prop_storage_key_roundtrip(
            prefix in "[a-z0-9]{0,8}",
            version in 1i64..100,
            key in ".{0,32}",
        ) {
            let keyspace = KeySpace::new(prefix, version);
            let storage = keyspace.storage_key(&key);
            prop_assert_eq!(keyspace.user_key(&storage), Some(key));
        }
    }
}
