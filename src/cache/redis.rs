//! Redis cache backend.

use std::time::Duration;

use async_trait::async_trait;
use backon::Retryable;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::{debug, info, warn};

use super::{Cache, Result};
use crate::utils::retry::connection_backoff;

/// Cache stored in Redis.
///
/// Entries with a ttl are written with `PSETEX`; entries without one with a
/// plain `SET` so they never expire.
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis, retrying with backoff while the server comes up.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL (e.g., redis://localhost:6379)
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url)?;
        let conn = (|| {
            let client = client.clone();
            async move { ConnectionManager::new(client).await }
        })
        .retry(connection_backoff())
        .notify(|err: &redis::RedisError, delay: Duration| {
            warn!(error = %err, retry_in = ?delay, "Redis not reachable, retrying");
        })
        .await?;

        info!("Connected to Redis for caching");

        Ok(Self { conn })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let bytes: Option<Vec<u8>> = conn.get(key).await?;
        debug!(key = %key, hit = bytes.is_some(), "Redis cache read");
        Ok(bytes)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => {
                let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
                let _: () = conn.pset_ex(key, value, millis).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        debug!(key = %key, "Redis cache write");
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        debug!(key = %key, "Redis cache delete");
        Ok(())
    }
}
