//! Cache configuration types.

use std::time::Duration;

use serde::Deserialize;

/// Default entry lifetime in seconds.
///
/// Bounds how long a read that loaded a row just before a concurrent Delete
/// can keep serving the deleted row from the cache.
pub const DEFAULT_TTL_SECS: u64 = 300;

/// Cache type discriminator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    /// Redis key/value store.
    Redis,
    /// In-process map; entries are lost on restart.
    #[default]
    Memory,
    /// Caching disabled; every read goes to the store.
    None,
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache type discriminator.
    #[serde(rename = "type")]
    pub cache_type: CacheType,
    /// Entry lifetime in seconds. Zero means entries never expire.
    pub ttl_secs: u64,
    /// Optional namespace prepended to every key (`{prefix}:{kind}:{id}`).
    pub key_prefix: Option<String>,
    /// Redis-specific configuration.
    pub redis: RedisConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: CacheType::default(),
            ttl_secs: DEFAULT_TTL_SECS,
            key_prefix: None,
            redis: RedisConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Entry lifetime, `None` for no expiration.
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }
}

/// Redis-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_default() {
        let cache = CacheConfig::default();
        assert_eq!(cache.cache_type, CacheType::Memory);
        assert_eq!(cache.ttl(), Some(Duration::from_secs(DEFAULT_TTL_SECS)));
        assert!(cache.key_prefix.is_none());
        assert_eq!(cache.redis.url, "redis://localhost:6379");
    }

    #[test]
    fn test_cache_ttl() {
        let cache = CacheConfig {
            ttl_secs: 90,
            ..Default::default()
        };
        assert_eq!(cache.ttl(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_cache_ttl_zero_never_expires() {
        let cache = CacheConfig {
            ttl_secs: 0,
            ..Default::default()
        };
        assert_eq!(cache.ttl(), None);
    }
}
