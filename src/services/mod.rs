//! Counter and event services.
//!
//! Services own the consistency protocol between the store and the cache:
//! reads go cache-first and fall back to the store (repopulating the cache),
//! writes commit to the store first and only then refresh or invalidate the
//! cache. Cache failures are logged and never change an operation's result.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::EntityCache;
use crate::model::EntityKind;
use crate::storage;

pub mod counter;
pub mod error;
pub mod event;

pub use counter::CounterService;
pub use error::{Result, ServiceError};
pub use event::EventService;

/// Cache-aside read of one entity.
///
/// A cache hit returns without touching the store. A miss, a cache error or
/// an undecodable entry falls through to `load`; a row found there is written
/// back to the cache. Returns `Ok(None)` if the store has no such row.
pub(crate) async fn read_through<T, F, Fut>(
    cache: &EntityCache,
    kind: EntityKind,
    id: &str,
    load: F,
) -> Result<Option<T>>
where
    T: Serialize + DeserializeOwned + Sync,
    F: FnOnce() -> Fut,
    Fut: Future<Output = storage::Result<Option<T>>>,
{
    match cache.get::<T>(kind, id).await {
        Ok(Some(value)) => {
            debug!(kind = %kind, id = %id, "Cache hit");
            return Ok(Some(value));
        }
        Ok(None) => debug!(kind = %kind, id = %id, "Cache miss"),
        Err(e) => warn!(kind = %kind, id = %id, error = %e, "Cache read failed, falling back to store"),
    }

    let loaded = load().await?;
    if let Some(value) = &loaded {
        refresh(cache, kind, id, value).await;
    }
    Ok(loaded)
}

/// Best-effort cache write of committed state.
pub(crate) async fn refresh<T: Serialize + Sync>(
    cache: &EntityCache,
    kind: EntityKind,
    id: &str,
    value: &T,
) {
    if let Err(e) = cache.set(kind, id, value).await {
        warn!(kind = %kind, id = %id, error = %e, "Cache write failed");
    }
}

/// Best-effort cache invalidation of committed state.
pub(crate) async fn invalidate(cache: &EntityCache, kind: EntityKind, id: &str) {
    if let Err(e) = cache.del(kind, id).await {
        warn!(kind = %kind, id = %id, error = %e, "Cache invalidation failed");
    }
}
