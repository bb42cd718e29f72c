//! Built-in adapter variants, one per backend family.

pub mod database;
pub mod file;
pub mod memcached;
pub mod memory;
pub mod noop;
pub mod redis;

pub use self::database::DatabaseAdapter;
pub use self::file::FileAdapter;
pub use self::memcached::MemcachedAdapter;
pub use self::memory::MemoryAdapter;
pub use self::noop::NoopAdapter;
pub use self::redis::{RedisAdapter, RedisClusterAdapter};

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Absolute expiry deadline for an optional TTL.
pub(crate) fn deadline(ttl: Option<Duration>) -> Option<DateTime<Utc>> {
    ttl.map(|t| {
        let millis = t.as_millis().min(i64::MAX as u128) as i64;
        Utc::now() + chrono::Duration::milliseconds(millis)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_none_means_no_expiry() {
        assert_eq!(deadline(None), None);
    }

    #[test]
    fn test_deadline_is_in_the_future() {
        let before = Utc::now();
        let at = deadline(Some(Duration::from_secs(60))).expect("deadline set");
        assert!(at > before + chrono::Duration::seconds(59));
    }
}
