//! Storage implementations.
//!
//! The store is the source of truth for counters and their events. Every
//! multi-row write runs in a single transaction; caches are only updated by
//! the services after the transaction has committed.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::clock::Clock;
use crate::config::{StorageConfig, StorageType};
use crate::model::{Counter, EntityKind, Event};

pub mod helpers;
pub mod mock;

#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub mod schema;
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub mod sql;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use mock::MockCounterStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCounterStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresCounterStore;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Invalid timestamp in store: {0}")]
    InvalidTimestamp(String),

    #[cfg(any(feature = "sqlite", feature = "postgres"))]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[cfg(any(feature = "sqlite", feature = "postgres"))]
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("Storage not supported: {0}")]
    Unsupported(String),
}

impl StorageError {
    pub fn counter_not_found(id: &str) -> Self {
        StorageError::NotFound {
            kind: EntityKind::Counter,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Interface for counter and event persistence.
///
/// Implementations:
/// - `SqliteCounterStore`: SQLite storage (standalone)
/// - `PostgresCounterStore`: PostgreSQL storage
/// - `MockCounterStore`: in-memory storage for tests
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Insert a counter and its genesis event in one transaction.
    ///
    /// The counter starts at [`crate::model::INITIAL_COUNT`]; the event has no
    /// duration.
    async fn create(&self, title: &str, event_title: &str) -> Result<(Counter, Event)>;

    /// Read one counter. `None` if no row matches.
    async fn get_counter(&self, id: &str) -> Result<Option<Counter>>;

    /// Enumerate every counter id.
    async fn list_counter_ids(&self) -> Result<Vec<String>>;

    /// Bump a counter and append an event in one transaction.
    ///
    /// The event's duration is measured from the counter's most recent event.
    /// Fails with [`StorageError::NotFound`] if the counter does not exist, in
    /// which case nothing is written.
    async fn increment(&self, id: &str, event_title: &str) -> Result<(Counter, Event)>;

    /// Delete a counter and all of its events in one transaction.
    ///
    /// Returns the ids of the deleted events. Fails with
    /// [`StorageError::NotFound`] if the counter does not exist.
    async fn delete(&self, id: &str) -> Result<Vec<String>>;

    /// Enumerate a counter's event ids, oldest first.
    async fn list_event_ids(&self, counter_id: &str) -> Result<Vec<String>>;

    /// Read one event. `None` if no row matches.
    async fn get_event(&self, id: &str) -> Result<Option<Event>>;
}

/// Initialize storage based on configuration.
///
/// Connects (retrying with backoff for network backends), applies the
/// migrations and returns the store behind the `CounterStore` interface.
pub async fn init_storage(
    config: &StorageConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn CounterStore>> {
    match config.storage_type {
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => {
            info!(path = %config.sqlite.path, "Storage: sqlite");
            let store = SqliteCounterStore::connect(&config.sqlite, clock).await?;
            store.init().await?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "postgres")]
        StorageType::Postgres => {
            info!(max_connections = config.postgres.max_connections, "Storage: postgres");
            let store = PostgresCounterStore::connect(&config.postgres, clock).await?;
            store.init().await?;
            Ok(Arc::new(store))
        }
        #[allow(unreachable_patterns)]
        ref other => {
            let _ = clock;
            tracing::error!(storage_type = ?other, "Storage backend requested but its feature is not enabled");
            Err(StorageError::Unsupported(format!("{:?}", other)))
        }
    }
}
