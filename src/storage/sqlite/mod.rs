//! SQLite implementation of the counter store.

mod counter_store;

pub use counter_store::{SqliteCounterStore, MEMORY_PATH};
