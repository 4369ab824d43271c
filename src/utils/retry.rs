//! Retry utilities.
//!
//! Uses `backon` for exponential backoff with jitter. Backends reached over
//! the network (PostgreSQL, Redis) may still be starting when the server
//! boots, so their initial connection is retried.

use std::time::Duration;

use backon::ExponentialBuilder;

/// Backoff for backend connection retries at startup.
///
/// - Min delay: 100ms
/// - Max delay: 5s
/// - Max attempts: 30
/// - Jitter enabled
pub fn connection_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(30)
        .with_jitter()
}
