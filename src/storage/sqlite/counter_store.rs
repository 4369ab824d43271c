//! SQLite CounterStore implementation.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sea_query::SqliteQueryBuilder;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::debug;

use crate::clock::Clock;
use crate::config::SqliteConfig;
use crate::model::{effective_now, elapsed_since, Counter, Event, INITIAL_COUNT};
use crate::storage::helpers::{format_instant, new_id};
use crate::storage::sql;
use crate::storage::{CounterStore, Result, StorageError};

/// Path value selecting a private in-memory database.
pub const MEMORY_PATH: &str = ":memory:";

/// SQLite implementation of CounterStore.
///
/// Write transactions start with `BEGIN IMMEDIATE`, so concurrent writers
/// queue on the database write lock instead of racing to upgrade a read lock.
/// An early return or a dropped request rolls the transaction back.
pub struct SqliteCounterStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteCounterStore {
    /// Create a new SQLite counter store.
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Open the database described by `config`, creating the file if needed.
    ///
    /// An in-memory database lives in a single pooled connection that is never
    /// recycled, otherwise each connection would see its own empty database.
    pub async fn connect(config: &SqliteConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let pool = if config.path == MEMORY_PATH {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await?
        } else {
            if let Some(parent) = Path::new(&config.path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StorageError::Unavailable(format!(
                            "cannot create {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
            }
            let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", config.path))?
                .create_if_missing(true)
                .foreign_keys(true);
            SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .connect_with(options)
                .await?
        };

        Ok(Self::new(pool, clock))
    }

    /// Apply the schema migrations.
    pub async fn init(&self) -> Result<()> {
        sqlx::migrate!("migrations/sqlite").run(&self.pool).await?;
        Ok(())
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open a write transaction holding the database write lock.
    ///
    /// The returned transaction rolls back when dropped uncommitted, which
    /// covers a request future cancelled between two statements.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    async fn counter_exists(conn: &mut SqliteConnection, id: &str) -> Result<bool> {
        let query = sql::select_counter_id(id).to_string(SqliteQueryBuilder);
        let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
        Ok(row.is_some())
    }

    async fn create_in(
        conn: &mut SqliteConnection,
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
        let query = sql::insert_counter(&counter, &stamp).to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&mut *conn).await?;

        let event = Event {
            id: new_id(),
            title: event_title.to_string(),
            counter_id: counter.id.clone(),
            duration: None,
            created_at: now,
        };
        let query = sql::insert_event(&event, INITIAL_COUNT, &stamp).to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&mut *conn).await?;

        Ok((counter, event))
    }

    async fn increment_in(
        conn: &mut SqliteConnection,
        clock: &dyn Clock,
        id: &str,
        event_title: &str,
    ) -> Result<(Counter, Event)> {
        // The write lock is held from BEGIN IMMEDIATE, so no sibling increment
        // can append an event between this read and our insert.
        let query = sql::select_last_event_at(id).to_string(SqliteQueryBuilder);
        let row = sqlx::query(&query).fetch_one(&mut *conn).await?;
        let previous = sql::last_event_at_from_row(&row)?;

        let now = effective_now(previous, clock.now());
        let stamp = format_instant(now);

        let query = sql::bump_counter(id, &stamp).to_string(SqliteQueryBuilder);
        let done = sqlx::query(&query).execute(&mut *conn).await?;
        if done.rows_affected() == 0 {
            return Err(StorageError::counter_not_found(id));
        }

        let query = sql::select_counter(id).to_string(SqliteQueryBuilder);
        let row = sqlx::query(&query).fetch_one(&mut *conn).await?;
        let counter = sql::counter_from_row(&row)?;

        let event = Event {
            id: new_id(),
            title: event_title.to_string(),
            counter_id: counter.id.clone(),
            duration: elapsed_since(previous, now),
            created_at: now,
        };
        let query = sql::insert_event(&event, counter.count, &stamp).to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&mut *conn).await?;

        Ok((counter, event))
    }

    async fn delete_in(conn: &mut SqliteConnection, id: &str) -> Result<Vec<String>> {
        if !Self::counter_exists(conn, id).await? {
            return Err(StorageError::counter_not_found(id));
        }

        let query = sql::select_event_ids(id).to_string(SqliteQueryBuilder);
        let rows = sqlx::query(&query).fetch_all(&mut *conn).await?;
        let event_ids = rows
            .iter()
            .map(sql::id_from_row)
            .collect::<Result<Vec<_>>>()?;

        let query = sql::delete_events(id).to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&mut *conn).await?;

        let query = sql::delete_counter(id).to_string(SqliteQueryBuilder);
        let done = sqlx::query(&query).execute(&mut *conn).await?;
        if done.rows_affected() == 0 {
            return Err(StorageError::counter_not_found(id));
        }

        Ok(event_ids)
    }
}

#[async_trait]
impl CounterStore for SqliteCounterStore {
    async fn create(&self, title: &str, event_title: &str) -> Result<(Counter, Event)> {
        let mut tx = self.begin_write().await?;

        let (counter, event) =
            Self::create_in(&mut tx, self.clock.as_ref(), title, event_title).await?;
        tx.commit().await?;

        debug!(counter_id = %counter.id, event_id = %event.id, "Inserted counter into SQLite");
        Ok((counter, event))
    }

    async fn get_counter(&self, id: &str) -> Result<Option<Counter>> {
        let query = sql::select_counter(id).to_string(SqliteQueryBuilder);
        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(sql::counter_from_row).transpose()
    }

    async fn list_counter_ids(&self) -> Result<Vec<String>> {
        let query = sql::select_counter_ids().to_string(SqliteQueryBuilder);
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(sql::id_from_row).collect()
    }

    async fn increment(&self, id: &str, event_title: &str) -> Result<(Counter, Event)> {
        let mut tx = self.begin_write().await?;

        let (counter, event) =
            Self::increment_in(&mut tx, self.clock.as_ref(), id, event_title).await?;
        tx.commit().await?;

        debug!(counter_id = %id, count = counter.count, "Incremented counter in SQLite");
        Ok((counter, event))
    }

    async fn delete(&self, id: &str) -> Result<Vec<String>> {
        let mut tx = self.begin_write().await?;

        let event_ids = Self::delete_in(&mut tx, id).await?;
        tx.commit().await?;

        debug!(counter_id = %id, events = event_ids.len(), "Deleted counter from SQLite");
        Ok(event_ids)
    }

    async fn list_event_ids(&self, counter_id: &str) -> Result<Vec<String>> {
        let query = sql::select_event_ids(counter_id).to_string(SqliteQueryBuilder);
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(sql::id_from_row).collect()
    }

    async fn get_event(&self, id: &str) -> Result<Option<Event>> {
        let query = sql::select_event(id).to_string(SqliteQueryBuilder);
        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(sql::event_from_row).transpose()
    }
}
