//! Counter service.

use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use tracing::{error, info};

use super::error::{require, Result, ServiceError};
use super::{invalidate, read_through, refresh};
use crate::cache::EntityCache;
use crate::model::{Counter, EntityKind, Event};
use crate::storage::CounterStore;

/// Orchestrates counter operations over the store and the cache.
///
/// Both handles are injected by the composition root; the service holds no
/// other state and is cheap to clone.
#[derive(Clone)]
pub struct CounterService {
    store: Arc<dyn CounterStore>,
    cache: EntityCache,
}

impl CounterService {
    pub fn new(store: Arc<dyn CounterStore>, cache: EntityCache) -> Self {
        Self { store, cache }
    }

    /// Create a counter together with its genesis event.
    ///
    /// Both rows are written in one store transaction. The cache is
    /// populated with both snapshots after the commit.
    pub async fn create(&self, title: &str, event_title: &str) -> Result<(Counter, Event)> {
        require("title", title)?;
        require("event_title", event_title)?;

        let (counter, event) = self.store.create(title, event_title).await.map_err(|e| {
            error!(title = %title, error = %e, "Create failed");
            ServiceError::from(e)
        })?;

        refresh(&self.cache, EntityKind::Counter, &counter.id, &counter).await;
        refresh(&self.cache, EntityKind::Event, &event.id, &event).await;

        info!(counter_id = %counter.id, title = %counter.title, "Counter created");
        Ok((counter, event))
    }

    /// Read one counter, cache first.
    pub async fn get(&self, id: &str) -> Result<Counter> {
        require("id", id)?;

        read_through(&self.cache, EntityKind::Counter, id, || self.store.get_counter(id))
            .await?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Counter, id))
    }

    /// Read every counter, ordered by id.
    ///
    /// Ids come from the store; each counter is then read cache first. A
    /// store failure on any item fails the whole list. A counter deleted
    /// between enumeration and lookup is left out.
    pub async fn list(&self) -> Result<Vec<Counter>> {
        let ids = self.store.list_counter_ids().await.map_err(|e| {
            error!(error = %e, "Counter enumeration failed");
            ServiceError::from(e)
        })?;

        let counters = try_join_all(ids.iter().map(|id| {
            read_through(&self.cache, EntityKind::Counter, id, move || {
                self.store.get_counter(id)
            })
        }))
        .await
        .map_err(|e| {
            error!(error = %e, "Counter list lookup failed");
            e
        })?;

        Ok(counters.into_iter().flatten().collect())
    }

    /// Bump a counter and record a duration-stamped event.
    ///
    /// The store runs the read-previous, update, insert sequence in one
    /// transaction. Both new snapshots are written through to the cache
    /// after the commit.
    pub async fn increment(&self, id: &str, event_title: &str) -> Result<(Counter, Event)> {
        require("id", id)?;
        require("event_title", event_title)?;

        let (counter, event) = self.store.increment(id, event_title).await.map_err(|e| {
            if !e.is_not_found() {
                error!(counter_id = %id, error = %e, "Increment failed");
            }
            ServiceError::from(e)
        })?;

        refresh(&self.cache, EntityKind::Counter, &counter.id, &counter).await;
        refresh(&self.cache, EntityKind::Event, &event.id, &event).await;

        info!(
            counter_id = %counter.id,
            count = counter.count,
            duration = ?event.duration,
            "Counter incremented"
        );
        Ok((counter, event))
    }

    /// Delete a counter and all of its events.
    ///
    /// After the store commits, the cache entries of the counter and of
    /// every deleted event are invalidated. Invalidation failures are logged
    /// per key and do not fail the delete.
    pub async fn delete(&self, id: &str) -> Result<()> {
        require("id", id)?;

        let event_ids = self.store.delete(id).await.map_err(|e| {
            if !e.is_not_found() {
                error!(counter_id = %id, error = %e, "Delete failed");
            }
            ServiceError::from(e)
        })?;

        let cache = &self.cache;
        join_all(
            event_ids
                .iter()
                .map(|event_id| invalidate(cache, EntityKind::Event, event_id)),
        )
        .await;
        invalidate(cache, EntityKind::Counter, id).await;

        info!(counter_id = %id, events = event_ids.len(), "Counter deleted");
        Ok(())
    }
}
