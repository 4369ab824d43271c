//! PostgreSQL CounterStore implementation.
//!
//! Increment and Delete lock the counter row with `SELECT ... FOR UPDATE`
//! before reading anything else, so two writers on the same counter serialise
//! while writers on different counters proceed in parallel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backon::Retryable;
use sea_query::{LockType, PostgresQueryBuilder};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::PostgresConfig;
use crate::model::{effective_now, elapsed_since, Counter, Event, INITIAL_COUNT};
use crate::storage::helpers::{format_instant, new_id};
use crate::storage::sql;
use crate::storage::{CounterStore, Result, StorageError};
use crate::utils::retry::connection_backoff;

/// PostgreSQL implementation of CounterStore.
pub struct PostgresCounterStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PostgresCounterStore {
    /// Create a new PostgreSQL counter store.
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Connect to PostgreSQL, retrying with backoff while the server comes up.
    pub async fn connect(config: &PostgresConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let pool = (|| async move {
            PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(&config.uri)
                .await
        })
        .retry(connection_backoff())
        .notify(|err: &sqlx::Error, delay: Duration| {
            warn!(error = %err, retry_in = ?delay, "PostgreSQL not reachable, retrying");
        })
        .await?;

        Ok(Self::new(pool, clock))
    }

    /// Apply the schema migrations.
    pub async fn init(&self) -> Result<()> {
        sqlx::migrate!("migrations/postgres").run(&self.pool).await?;
        Ok(())
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Take the row lock on a counter. Returns false if the counter does not exist.
    async fn lock_counter(conn: &mut PgConnection, id: &str) -> Result<bool> {
        let mut stmt = sql::select_counter_id(id);
        stmt.lock(LockType::Update);
        let query = stmt.to_string(PostgresQueryBuilder);
        let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
        Ok(row.is_some())
    }

    async fn create_in(
        conn: &mut PgConnection,
        clock: &dyn Clock,
        title: &str,
        event_title: &str,
    ) -> Result<(Counter, Event)> {
        let now = clock.now();
        let stamp = format_instant(now);

        let counter = Counter {
            id: new_id(),
            title: title.to_string(),
            count: INITIAL_COUNT,
            timestamp: now,
        };
        let query = sql::insert_counter(&counter, &stamp).to_string(PostgresQueryBuilder);
        sqlx::query(&query).execute(&mut *conn).await?;

        let event = Event {
            id: new_id(),
            title: event_title.to_string(),
            counter_id: counter.id.clone(),
            duration: None,
            created_at: now,
        };
        let query = sql::insert_event(&event, INITIAL_COUNT, &stamp).to_string(PostgresQueryBuilder);
        sqlx::query(&query).execute(&mut *conn).await?;

        Ok((counter, event))
    }

    async fn increment_in(
        conn: &mut PgConnection,
        clock: &dyn Clock,
        id: &str,
        event_title: &str,
    ) -> Result<(Counter, Event)> {
        if !Self::lock_counter(conn, id).await? {
            return Err(StorageError::counter_not_found(id));
        }

        let query = sql::select_last_event_at(id).to_string(PostgresQueryBuilder);
        let row = sqlx::query(&query).fetch_one(&mut *conn).await?;
        let previous = sql::last_event_at_from_row(&row)?;

        // Sampled under the row lock: a sibling increment has either committed
        // its event already or is waiting behind us.
        let now = effective_now(previous, clock.now());
        let stamp = format_instant(now);

        let query = sql::bump_counter(id, &stamp).to_string(PostgresQueryBuilder);
        let done = sqlx::query(&query).execute(&mut *conn).await?;
        if done.rows_affected() == 0 {
            return Err(StorageError::counter_not_found(id));
        }

        let query = sql::select_counter(id).to_string(PostgresQueryBuilder);
        let row = sqlx::query(&query).fetch_one(&mut *conn).await?;
        let counter = sql::counter_from_row(&row)?;

        let event = Event {
            id: new_id(),
            title: event_title.to_string(),
            counter_id: counter.id.clone(),
            duration: elapsed_since(previous, now),
            created_at: now,
        };
        let query = sql::insert_event(&event, counter.count, &stamp).to_string(PostgresQueryBuilder);
        sqlx::query(&query).execute(&mut *conn).await?;

        Ok((counter, event))
    }

    async fn delete_in(conn: &mut PgConnection, id: &str) -> Result<Vec<String>> {
        if !Self::lock_counter(conn, id).await? {
            return Err(StorageError::counter_not_found(id));
        }

        let query = sql::select_event_ids(id).to_string(PostgresQueryBuilder);
        let rows = sqlx::query(&query).fetch_all(&mut *conn).await?;
        let event_ids = rows
            .iter()
            .map(sql::id_from_row)
            .collect::<Result<Vec<_>>>()?;

        let query = sql::delete_events(id).to_string(PostgresQueryBuilder);
        sqlx::query(&query).execute(&mut *conn).await?;

        let query = sql::delete_counter(id).to_string(PostgresQueryBuilder);
        let done = sqlx::query(&query).execute(&mut *conn).await?;
        if done.rows_affected() == 0 {
            return Err(StorageError::counter_not_found(id));
        }

        Ok(event_ids)
    }
}

#[async_trait]
impl CounterStore for PostgresCounterStore {
    async fn create(&self, title: &str, event_title: &str) -> Result<(Counter, Event)> {
        let mut tx = self.pool.begin().await?;

        match Self::create_in(&mut tx, self.clock.as_ref(), title, event_title).await {
            Ok((counter, event)) => {
                tx.commit().await?;
                debug!(counter_id = %counter.id, event_id = %event.id, "Inserted counter into PostgreSQL");
                Ok((counter, event))
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    async fn get_counter(&self, id: &str) -> Result<Option<Counter>> {
        let query = sql::select_counter(id).to_string(PostgresQueryBuilder);
        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(sql::counter_from_row).transpose()
    }

    async fn list_counter_ids(&self) -> Result<Vec<String>> {
        let query = sql::select_counter_ids().to_string(PostgresQueryBuilder);
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(sql::id_from_row).collect()
    }

    async fn increment(&self, id: &str, event_title: &str) -> Result<(Counter, Event)> {
        let mut tx = self.pool.begin().await?;

        match Self::increment_in(&mut tx, self.clock.as_ref(), id, event_title).await {
            Ok((counter, event)) => {
                tx.commit().await?;
                debug!(counter_id = %id, count = counter.count, "Incremented counter in PostgreSQL");
                Ok((counter, event))
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    async fn delete(&self, id: &str) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await?;

        match Self::delete_in(&mut tx, id).await {
            Ok(event_ids) => {
                tx.commit().await?;
                debug!(counter_id = %id, events = event_ids.len(), "Deleted counter from PostgreSQL");
                Ok(event_ids)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    async fn list_event_ids(&self, counter_id: &str) -> Result<Vec<String>> {
        let query = sql::select_event_ids(counter_id).to_string(PostgresQueryBuilder);
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(sql::id_from_row).collect()
    }

    async fn get_event(&self, id: &str) -> Result<Option<Event>> {
        let query = sql::select_event(id).to_string(PostgresQueryBuilder);
        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(sql::event_from_row).transpose()
    }
}
