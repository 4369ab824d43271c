//! CounterStore interface tests.
//!
//! These tests verify the contract of the CounterStore trait. Each storage
//! implementation should run these tests with a store driven by the
//! `ManualClock` passed alongside it.

use std::sync::Arc;
use std::time::Duration;

use counters::clock::{Clock, ManualClock};
use counters::model::{Event, INITIAL_COUNT};
use counters::storage::{CounterStore, StorageError};

/// Fetch every event of a counter, oldest first.
pub async fn events_of<S: CounterStore + ?Sized>(store: &S, counter_id: &str) -> Vec<Event> {
    let ids = store
        .list_event_ids(counter_id)
        .await
        .expect("list_event_ids should succeed");
    let mut events = Vec::with_capacity(ids.len());
    for id in ids {
        events.push(
            store
                .get_event(&id)
                .await
                .expect("get_event should succeed")
                .expect("listed event should exist"),
        );
    }
    events
}

// =============================================================================
// CounterStore::create tests
// =============================================================================

pub async fn test_create_writes_counter_and_genesis<S: CounterStore>(store: &S, clock: &ManualClock) {
    let (counter, event) = store
        .create("Pushups", "init")
        .await
        .expect("create should succeed");

    assert_eq!(counter.title, "Pushups");
    assert_eq!(counter.count, INITIAL_COUNT);
    assert_eq!(counter.timestamp, clock.now());
    assert_eq!(event.title, "init");
    assert_eq!(event.counter_id, counter.id);
    assert!(event.duration.is_none(), "genesis event has no predecessor");
    assert_eq!(event.created_at, counter.timestamp);

    let stored = store
        .get_counter(&counter.id)
        .await
        .expect("get_counter should succeed");
    assert_eq!(stored, Some(counter.clone()));

    let events = events_of(store, &counter.id).await;
    assert_eq!(events, vec![event]);
}

pub async fn test_create_assigns_distinct_ids<S: CounterStore>(store: &S) {
    let (a, ea) = store.create("A", "init").await.expect("create should succeed");
    let (b, eb) = store.create("B", "init").await.expect("create should succeed");

    assert_ne!(a.id, b.id);
    assert_ne!(ea.id, eb.id);
}

// =============================================================================
// Read tests
// =============================================================================

pub async fn test_get_missing_counter<S: CounterStore>(store: &S) {
    let counter = store
        .get_counter("no-such-counter")
        .await
        .expect("get_counter should succeed");
    assert!(counter.is_none());
}

pub async fn test_get_missing_event<S: CounterStore>(store: &S) {
    let event = store
        .get_event("no-such-event")
        .await
        .expect("get_event should succeed");
    assert!(event.is_none());
}

pub async fn test_list_counter_ids_sorted<S: CounterStore>(store: &S) {
    let (a, _) = store.create("A", "init").await.expect("create should succeed");
    let (b, _) = store.create("B", "init").await.expect("create should succeed");

    let ids = store
        .list_counter_ids()
        .await
        .expect("list_counter_ids should succeed");

    assert!(ids.contains(&a.id));
    assert!(ids.contains(&b.id));
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted, "ids should be ordered");
}

pub async fn test_list_event_ids_unknown_counter<S: CounterStore>(store: &S) {
    let ids = store
        .list_event_ids("no-such-counter")
        .await
        .expect("list_event_ids should succeed");
    assert!(ids.is_empty());
}

// =============================================================================
// CounterStore::increment tests
// =============================================================================

pub async fn test_increment_measures_from_previous<S: CounterStore>(store: &S, clock: &ManualClock) {
    let (counter, genesis) = store.create("Pushups", "init").await.expect("create should succeed");

    clock.advance(Duration::from_millis(1_500));
    let (updated, event) = store
        .increment(&counter.id, "did 10")
        .await
        .expect("increment should succeed");

    assert_eq!(updated.id, counter.id);
    assert_eq!(updated.title, counter.title);
    assert_eq!(updated.count, INITIAL_COUNT + 1);
    assert_eq!(updated.timestamp, event.created_at);
    assert_eq!(event.title, "did 10");
    assert_eq!(event.duration, Some(Duration::from_millis(1_500)));
    assert_eq!(
        (event.created_at - genesis.created_at).to_std().unwrap(),
        Duration::from_millis(1_500)
    );

    let stored = store.get_counter(&counter.id).await.unwrap();
    assert_eq!(stored, Some(updated));
}

pub async fn test_increment_chain<S: CounterStore>(store: &S, clock: &ManualClock) {
    let (counter, _) = store.create("Chain", "init").await.expect("create should succeed");
    let gaps = [3u64, 1, 4, 1, 5];

    for gap in gaps {
        clock.advance(Duration::from_secs(gap));
        store
            .increment(&counter.id, "bump")
            .await
            .expect("increment should succeed");
    }

    let stored = store.get_counter(&counter.id).await.unwrap().unwrap();
    assert_eq!(stored.count, INITIAL_COUNT + gaps.len() as i64);

    let events = events_of(store, &counter.id).await;
    assert_eq!(events.len(), gaps.len() + 1);
    assert!(events[0].duration.is_none());
    for (event, gap) in events[1..].iter().zip(gaps) {
        assert_eq!(event.duration, Some(Duration::from_secs(gap)));
    }
    for pair in events.windows(2) {
        assert!(pair[0].created_at <= pair[1].created_at, "events ordered by creation");
    }
}

pub async fn test_increment_clock_step_back<S: CounterStore>(store: &S, clock: &ManualClock) {
    let (counter, genesis) = store.create("Skew", "init").await.expect("create should succeed");

    clock.set(genesis.created_at - chrono::Duration::seconds(30));
    let (_, event) = store
        .increment(&counter.id, "after skew")
        .await
        .expect("increment should succeed");

    assert_eq!(event.duration, Some(Duration::ZERO));
    assert_eq!(event.created_at, genesis.created_at);

    // Restore forward progress for later tests sharing the clock.
    clock.set(genesis.created_at + chrono::Duration::seconds(1));
}

/// Events that share an instant after the clock steps back still list in the
/// order they were committed.
pub async fn test_increment_order_under_repeated_step_back<S: CounterStore>(
    store: &S,
    clock: &ManualClock,
) {
    let (counter, genesis) = store.create("Skewed chain", "init").await.unwrap();

    clock.set(genesis.created_at - chrono::Duration::seconds(5));
    let mut committed = vec![genesis.id.clone()];
    for i in 0..6 {
        let (_, event) = store
            .increment(&counter.id, &format!("stalled {}", i))
            .await
            .expect("increment should succeed");
        assert_eq!(event.created_at, genesis.created_at);
        committed.push(event.id);
    }

    let listed = store.list_event_ids(&counter.id).await.unwrap();
    assert_eq!(listed, committed);

    clock.set(genesis.created_at + chrono::Duration::seconds(1));
}

pub async fn test_increment_unknown_counter<S: CounterStore>(store: &S) {
    let result = store.increment("no-such-counter", "did 10").await;

    assert!(
        matches!(result, Err(StorageError::NotFound { .. })),
        "expected NotFound, got {:?}",
        result
    );
    assert!(store.list_event_ids("no-such-counter").await.unwrap().is_empty());
}

// =============================================================================
// CounterStore::delete tests
// =============================================================================

pub async fn test_delete_removes_counter_and_events<S: CounterStore>(store: &S, clock: &ManualClock) {
    let (counter, genesis) = store.create("Doomed", "init").await.expect("create should succeed");
    clock.advance(Duration::from_secs(1));
    let (_, second) = store.increment(&counter.id, "again").await.unwrap();
    let (survivor, _) = store.create("Survivor", "init").await.unwrap();

    let deleted = store.delete(&counter.id).await.expect("delete should succeed");

    assert_eq!(deleted, vec![genesis.id.clone(), second.id.clone()]);
    assert!(store.get_counter(&counter.id).await.unwrap().is_none());
    assert!(store.get_event(&genesis.id).await.unwrap().is_none());
    assert!(store.get_event(&second.id).await.unwrap().is_none());
    assert!(store.list_event_ids(&counter.id).await.unwrap().is_empty());
    assert!(!store.list_counter_ids().await.unwrap().contains(&counter.id));
    assert!(store.get_counter(&survivor.id).await.unwrap().is_some());
}

pub async fn test_delete_unknown_counter<S: CounterStore>(store: &S) {
    let (counter, _) = store.create("Kept", "init").await.unwrap();

    let result = store.delete("no-such-counter").await;

    assert!(
        matches!(result, Err(StorageError::NotFound { .. })),
        "expected NotFound, got {:?}",
        result
    );
    assert!(store.get_counter(&counter.id).await.unwrap().is_some());
    assert_eq!(events_of(store, &counter.id).await.len(), 1);
}

// =============================================================================
// Concurrency
// =============================================================================

/// Concurrent increments of one counter serialize: none is lost and every
/// duration is measured from the event committed just before it.
pub async fn test_concurrent_increments(store: Arc<dyn CounterStore>, clock: Arc<ManualClock>) {
    const WRITERS: usize = 8;

    let (counter, genesis) = store.create("Contended", "init").await.unwrap();

    let mut handles = Vec::with_capacity(WRITERS);
    for i in 0..WRITERS {
        let store = store.clone();
        let clock = clock.clone();
        let id = counter.id.clone();
        handles.push(tokio::spawn(async move {
            clock.advance(Duration::from_millis(10));
            store.increment(&id, &format!("writer {}", i)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().expect("increment should succeed");
    }

    let stored = store.get_counter(&counter.id).await.unwrap().unwrap();
    assert_eq!(stored.count, INITIAL_COUNT + WRITERS as i64);

    let events = events_of(store.as_ref(), &counter.id).await;
    assert_eq!(events.len(), WRITERS + 1);

    let total: Duration = events.iter().filter_map(|e| e.duration).sum();
    let last = events.last().unwrap();
    assert_eq!(
        (last.created_at - genesis.created_at).to_std().unwrap(),
        total,
        "durations form an unbroken chain"
    );
    assert_eq!(stored.timestamp, last.created_at);
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all CounterStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_counter_store_tests {
    ($store:expr, $clock:expr) => {
        use $crate::storage::counter_store_tests::*;

        // create tests
        test_create_writes_counter_and_genesis($store, $clock).await;
        println!("  test_create_writes_counter_and_genesis: PASSED");

        test_create_assigns_distinct_ids($store).await;
        println!("  test_create_assigns_distinct_ids: PASSED");

        // read tests
        test_get_missing_counter($store).await;
        println!("  test_get_missing_counter: PASSED");

        test_get_missing_event($store).await;
        println!("  test_get_missing_event: PASSED");

        test_list_counter_ids_sorted($store).await;
        println!("  test_list_counter_ids_sorted: PASSED");

        test_list_event_ids_unknown_counter($store).await;
        println!("  test_list_event_ids_unknown_counter: PASSED");

        // increment tests
        test_increment_measures_from_previous($store, $clock).await;
        println!("  test_increment_measures_from_previous: PASSED");

        test_increment_chain($store, $clock).await;
        println!("  test_increment_chain: PASSED");

        test_increment_clock_step_back($store, $clock).await;
        println!("  test_increment_clock_step_back: PASSED");

        test_increment_order_under_repeated_step_back($store, $clock).await;
        println!("  test_increment_order_under_repeated_step_back: PASSED");

        test_increment_unknown_counter($store).await;
        println!("  test_increment_unknown_counter: PASSED");

        // delete tests
        test_delete_removes_counter_and_events($store, $clock).await;
        println!("  test_delete_removes_counter_and_events: PASSED");

        test_delete_unknown_counter($store).await;
        println!("  test_delete_unknown_counter: PASSED");
    };
}
