//! Cache layer in front of the counter store.
//!
//! The cache holds JSON snapshots of counters and events keyed by
//! `{kind}:{id}` (optionally namespaced with a prefix). It is never the
//! source of truth: services read through it (cache-aside) and refresh or
//! invalidate entries only after the store has committed.
//!
//! Backends:
//! - `MemoryCache`: in-process map, the standalone default
//! - `RedisCache`: shared Redis instance
//! - `NoopCache`: caching disabled

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::config::{CacheConfig, CacheType};
use crate::model::EntityKind;

pub mod memory;
pub mod noop;

#[cfg(feature = "redis")]
pub mod redis;

pub use memory::MemoryCache;
pub use noop::NoopCache;

#[cfg(feature = "redis")]
pub use self::redis::RedisCache;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors raised by cache backends.
///
/// None of these ever reach a caller of the services: a failing cache
/// degrades to a miss on reads and to a logged warning on writes.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    #[error("Cache not supported: {0}")]
    Unsupported(String),
}

/// Raw key/value cache backend.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch the bytes stored under `key`, `None` on a miss.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`. `None` ttl means the entry never expires.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn del(&self, key: &str) -> Result<()>;
}

/// Typed view over a [`Cache`] backend.
///
/// Builds keys from an entity kind and id and (de)serializes values as
/// JSON. Cheap to clone.
#[derive(Clone)]
pub struct EntityCache {
    backend: Arc<dyn Cache>,
    key_prefix: Option<String>,
    ttl: Option<Duration>,
}

impl EntityCache {
    pub fn new(backend: Arc<dyn Cache>, key_prefix: Option<String>, ttl: Option<Duration>) -> Self {
        Self {
            backend,
            key_prefix,
            ttl,
        }
    }

    /// Cache with caching disabled.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopCache), None, None)
    }

    /// Cache key for an entity.
    pub fn key(&self, kind: EntityKind, id: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}:{}:{}", prefix, kind, id),
            None => format!("{}:{}", kind, id),
        }
    }

    /// Read and decode an entity.
    ///
    /// An entry that does not decode is reported as a serialization error so
    /// the caller can treat it as a miss.
    pub async fn get<T: DeserializeOwned>(&self, kind: EntityKind, id: &str) -> Result<Option<T>> {
        let key = self.key(kind, id);
        match self.backend.get(&key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Write an entity with the configured ttl.
    pub async fn set<T: Serialize + Sync>(&self, kind: EntityKind, id: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.backend.set(&self.key(kind, id), bytes, self.ttl).await
    }

    /// Drop an entity's entry.
    pub async fn del(&self, kind: EntityKind, id: &str) -> Result<()> {
        self.backend.del(&self.key(kind, id)).await
    }
}

/// Initialize the cache based on configuration.
pub async fn init_cache(config: &CacheConfig) -> Result<EntityCache> {
    let backend: Arc<dyn Cache> = match config.cache_type {
        CacheType::Memory => {
            info!("Cache: memory");
            Arc::new(MemoryCache::new())
        }
        CacheType::None => {
            info!("Cache: disabled");
            Arc::new(NoopCache)
        }
        #[cfg(feature = "redis")]
        CacheType::Redis => {
            info!("Cache: redis");
            Arc::new(RedisCache::connect(&config.redis.url).await?)
        }
        #[allow(unreachable_patterns)]
        ref other => {
            tracing::error!(cache_type = ?other, "Cache backend requested but its feature is not enabled");
            return Err(CacheError::Unsupported(format!("{:?}", other)));
        }
    };

    Ok(EntityCache::new(backend, config.key_prefix.clone(), config.ttl()))
}
