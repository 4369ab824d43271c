//! Event service.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, error};

use super::error::{require, Result, ServiceError};
use super::read_through;
use crate::cache::EntityCache;
use crate::model::{EntityKind, Event};
use crate::storage::CounterStore;

/// Read access to the events of a counter.
#[derive(Clone)]
pub struct EventService {
    store: Arc<dyn CounterStore>,
    cache: EntityCache,
}

impl EventService {
    pub fn new(store: Arc<dyn CounterStore>, cache: EntityCache) -> Self {
        Self { store, cache }
    }

    /// List a counter's events, oldest first.
    ///
    /// Same failure policy as the counter list: an unknown counter yields an
    /// empty list, a store failure on any item fails the whole list.
    pub async fn list(&self, counter_id: &str) -> Result<Vec<Event>> {
        require("counter_id", counter_id)?;

        let ids = self.store.list_event_ids(counter_id).await.map_err(|e| {
            error!(counter_id = %counter_id, error = %e, "Event enumeration failed");
            ServiceError::from(e)
        })?;

        let events = try_join_all(ids.iter().map(|id| {
            read_through(&self.cache, EntityKind::Event, id, move || {
                self.store.get_event(id)
            })
        }))
        .await
        .map_err(|e| {
            error!(counter_id = %counter_id, error = %e, "Event list lookup failed");
            e
        })?;

        let events: Vec<Event> = events.into_iter().flatten().collect();
        debug!(counter_id = %counter_id, events = events.len(), "Listed events");
        Ok(events)
    }
}
