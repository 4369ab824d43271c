//! Shared storage integration tests.
//!
//! Tests the CounterStore interface against every SQL implementation.
//! Each implementation module imports these test functions and runs them.

pub mod counter_store_tests;
