//! Shared storage helper functions.
//!
//! Instant and duration encodings used by every SQL backend.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};

use super::{Result, StorageError};

/// Generate a new store-assigned identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Encode an instant as a fixed-width RFC 3339 UTC string.
///
/// Nanosecond precision and the `Z` suffix keep every value the same width, so
/// lexical order (`MAX`, `ORDER BY`) matches chronological order.
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Decode an instant written by [`format_instant`].
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StorageError::InvalidTimestamp(value.to_string()))
}

/// Encode a duration as whole nanoseconds, saturating at `i64::MAX`.
pub fn duration_to_nanos(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
}

/// Decode a stored nanosecond count. Negative values decode as zero.
pub fn nanos_to_duration(nanos: i64) -> Duration {
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(0))
}
