//! Mock CounterStore implementation for testing.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::clock::{Clock, SystemClock};
use crate::model::{effective_now, elapsed_since, Counter, Event, INITIAL_COUNT};
use crate::storage::helpers::new_id;
use crate::storage::{CounterStore, Result, StorageError};

#[derive(Default)]
struct State {
    counters: BTreeMap<String, Counter>,
    events: HashMap<String, Event>,
    seqs: HashMap<String, i64>,
}

impl State {
    fn event_ids(&self, counter_id: &str) -> Vec<String> {
        let mut events: Vec<(i64, &String)> = self
            .events
            .values()
            .filter(|e| e.counter_id == counter_id)
            .map(|e| (self.seqs.get(&e.id).copied().unwrap_or_default(), &e.id))
            .collect();
        events.sort();
        events.into_iter().map(|(_, id)| id.clone()).collect()
    }
}

/// Mock counter store that keeps rows in memory.
///
/// Writes hold a single lock for their whole duration, which gives them the
/// same all-or-nothing visibility as a store transaction. Failure switches
/// let tests exercise the store-unavailable paths.
pub struct MockCounterStore {
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
    fail_on_write: RwLock<bool>,
    fail_on_read: RwLock<bool>,
    fail_on_list: RwLock<bool>,
    fail_event_insert: RwLock<bool>,
    fail_get_for: RwLock<HashSet<String>>,
    counter_reads: AtomicUsize,
    event_reads: AtomicUsize,
}

impl MockCounterStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            clock,
            fail_on_write: RwLock::new(false),
            fail_on_read: RwLock::new(false),
            fail_on_list: RwLock::new(false),
            fail_event_insert: RwLock::new(false),
            fail_get_for: RwLock::new(HashSet::new()),
            counter_reads: AtomicUsize::new(0),
            event_reads: AtomicUsize::new(0),
        }
    }

    /// Fail every transactional write before it touches any row.
    pub async fn set_fail_on_write(&self, fail: bool) {
        *self.fail_on_write.write().await = fail;
    }

    /// Fail every single-row read.
    pub async fn set_fail_on_read(&self, fail: bool) {
        *self.fail_on_read.write().await = fail;
    }

    /// Fail id enumeration.
    pub async fn set_fail_on_list(&self, fail: bool) {
        *self.fail_on_list.write().await = fail;
    }

    /// Fail the event insert inside Create/Increment, after the counter row
    /// has been written, so the whole write must roll back.
    pub async fn set_fail_event_insert(&self, fail: bool) {
        *self.fail_event_insert.write().await = fail;
    }

    /// Fail single-row reads of one id (counter or event).
    pub async fn fail_get_for(&self, id: &str) {
        self.fail_get_for.write().await.insert(id.to_string());
    }

    /// Number of `get_counter` calls that reached the store.
    pub fn counter_reads(&self) -> usize {
        self.counter_reads.load(Ordering::SeqCst)
    }

    /// Number of `get_event` calls that reached the store.
    pub fn event_reads(&self) -> usize {
        self.event_reads.load(Ordering::SeqCst)
    }

    /// Number of events stored for a counter.
    pub async fn stored_event_count(&self, counter_id: &str) -> usize {
        self.state.lock().await.event_ids(counter_id).len()
    }

    /// Number of counters stored.
    pub async fn stored_counter_count(&self) -> usize {
        self.state.lock().await.counters.len()
    }

    async fn check_read(&self, id: &str) -> Result<()> {
        if *self.fail_on_read.read().await || self.fail_get_for.read().await.contains(id) {
            return Err(StorageError::Unavailable(format!("read of {} failed", id)));
        }
        Ok(())
    }

    async fn check_write(&self) -> Result<()> {
        if *self.fail_on_write.read().await {
            return Err(StorageError::Unavailable("write failed".to_string()));
        }
        Ok(())
    }

    async fn check_event_insert(&self) -> Result<()> {
        if *self.fail_event_insert.read().await {
            return Err(StorageError::Unavailable("event insert failed".to_string()));
        }
        Ok(())
    }
}

impl Default for MockCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for MockCounterStore {
    async fn create(&self, title: &str, event_title: &str) -> Result<(Counter, Event)> {
        self.check_write().await?;
        let mut state = self.state.lock().await;

        let now = self.clock.now();
        let counter = Counter {
            id: new_id(),
            title: title.to_string(),
            count: INITIAL_COUNT,
            timestamp: now,
        };
        let event = Event {
            id: new_id(),
            title: event_title.to_string(),
            counter_id: counter.id.clone(),
            duration: None,
            created_at: now,
        };

        // Nothing is applied until both rows are ready.
        self.check_event_insert().await?;
        state.counters.insert(counter.id.clone(), counter.clone());
        state.seqs.insert(event.id.clone(), INITIAL_COUNT);
        state.events.insert(event.id.clone(), event.clone());
        Ok((counter, event))
    }

    async fn get_counter(&self, id: &str) -> Result<Option<Counter>> {
        self.counter_reads.fetch_add(1, Ordering::SeqCst);
        self.check_read(id).await?;
        Ok(self.state.lock().await.counters.get(id).cloned())
    }

    async fn list_counter_ids(&self) -> Result<Vec<String>> {
        if *self.fail_on_list.read().await {
            return Err(StorageError::Unavailable("counter enumeration failed".to_string()));
        }
        Ok(self.state.lock().await.counters.keys().cloned().collect())
    }

    async fn increment(&self, id: &str, event_title: &str) -> Result<(Counter, Event)> {
        self.check_write().await?;
        let mut state = self.state.lock().await;

        let previous = state
            .events
            .values()
            .filter(|e| e.counter_id == id)
            .map(|e| e.created_at)
            .max();
        let now = effective_now(previous, self.clock.now());

        let mut counter = state
            .counters
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::counter_not_found(id))?;
        counter.count += 1;
        counter.timestamp = now;

        let event = Event {
            id: new_id(),
            title: event_title.to_string(),
            counter_id: id.to_string(),
            duration: elapsed_since(previous, now),
            created_at: now,
        };

        self.check_event_insert().await?;
        state.counters.insert(counter.id.clone(), counter.clone());
        state.seqs.insert(event.id.clone(), counter.count);
        state.events.insert(event.id.clone(), event.clone());
        Ok((counter, event))
    }

    async fn delete(&self, id: &str) -> Result<Vec<String>> {
        self.check_write().await?;
        let mut state = self.state.lock().await;

        if !state.counters.contains_key(id) {
            return Err(StorageError::counter_not_found(id));
        }

        let event_ids = state.event_ids(id);
        for event_id in &event_ids {
            state.events.remove(event_id);
            state.seqs.remove(event_id);
        }
        state.counters.remove(id);
        Ok(event_ids)
    }

    async fn list_event_ids(&self, counter_id: &str) -> Result<Vec<String>> {
        if *self.fail_on_list.read().await {
            return Err(StorageError::Unavailable("event enumeration failed".to_string()));
        }
        Ok(self.state.lock().await.event_ids(counter_id))
    }

    async fn get_event(&self, id: &str) -> Result<Option<Event>> {
        self.event_reads.fetch_add(1, Ordering::SeqCst);
        self.check_read(id).await?;
        Ok(self.state.lock().await.events.get(id).cloned())
    }
}
