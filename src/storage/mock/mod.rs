//! Mock storage implementations for testing.

mod counter_store;

pub use counter_store::MockCounterStore;
