//! Counter and event data model.
//!
//! A counter is a named, monotonically incrementing value. Every increment
//! records an [`Event`] whose duration is the time elapsed since the previous
//! event on the same counter.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Count reported by a freshly created counter.
///
/// A counter starts at zero and the genesis event written by Create counts as
/// its first increment. `count` therefore always equals the number of events
/// ever recorded for the counter.
pub const INITIAL_COUNT: i64 = 1;

/// A named counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    /// Store-assigned identifier.
    pub id: String,
    /// Display title, fixed at creation.
    pub title: String,
    /// Number of events recorded for this counter.
    pub count: i64,
    /// Last-modified instant (creation or latest increment).
    pub timestamp: DateTime<Utc>,
}

/// One recorded increment of a counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Store-assigned identifier.
    pub id: String,
    /// Short label describing the cause of the event.
    pub title: String,
    /// Owning counter.
    pub counter_id: String,
    /// Time since the preceding event on the same counter.
    ///
    /// `None` when there is no predecessor (the genesis event written by Create).
    pub duration: Option<Duration>,
    /// Instant the store recorded the event.
    pub created_at: DateTime<Utc>,
}

/// Kind of entity held in the cache, used as the key namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Counter,
    Event,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Counter => "counter",
            EntityKind::Event => "event",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instant to record for a new event given the previous event's instant.
///
/// Keeps `created_at` non-decreasing along a counter's chain even if the clock
/// steps backwards between two increments.
pub fn effective_now(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match previous {
        Some(prev) if prev > now => prev,
        _ => now,
    }
}

/// Duration of a new event recorded at `now`.
///
/// Returns `None` when there is no previous event.
pub fn elapsed_since(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<Duration> {
    previous.map(|prev| (now - prev).to_std().unwrap_or(Duration::ZERO))
}
