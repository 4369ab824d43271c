//! Shared SQL building blocks.
//!
//! Statement builders and row decoding shared by the SQL backends
//! (PostgreSQL, SQLite). Each backend renders the statements with its own
//! sea-query builder and runs them inside its own transaction discipline.

use sea_query::{
    DeleteStatement, Expr, InsertStatement, Order, Query, SelectStatement, UpdateStatement,
};
use sqlx::{ColumnIndex, Decode, Row, Type};

use crate::model::{Counter, Event};
use crate::storage::helpers::{duration_to_nanos, nanos_to_duration, parse_instant};
use crate::storage::schema::{Counters, Events};
use crate::storage::Result;

pub fn insert_counter(counter: &Counter, updated_at: &str) -> InsertStatement {
    Query::insert()
        .into_table(Counters::Table)
        .columns([
            Counters::Id,
            Counters::Title,
            Counters::Count,
            Counters::UpdatedAt,
        ])
        .values_panic([
            counter.id.clone().into(),
            counter.title.clone().into(),
            counter.count.into(),
            updated_at.into(),
        ])
        .to_owned()
}

/// Insert an event at position `seq` in its counter's chain.
///
/// `seq` is the counter's count after the write, so it starts at
/// [`crate::model::INITIAL_COUNT`] and never repeats within a counter.
pub fn insert_event(event: &Event, seq: i64, created_at: &str) -> InsertStatement {
    let duration_nanos: Option<i64> = event.duration.map(duration_to_nanos);

    Query::insert()
        .into_table(Events::Table)
        .columns([
            Events::Id,
            Events::CounterId,
            Events::Title,
            Events::Seq,
            Events::DurationNanos,
            Events::CreatedAt,
        ])
        .values_panic([
            event.id.clone().into(),
            event.counter_id.clone().into(),
            event.title.clone().into(),
            seq.into(),
            duration_nanos.into(),
            created_at.into(),
        ])
        .to_owned()
}

pub fn select_counter(id: &str) -> SelectStatement {
    Query::select()
        .columns([
            Counters::Id,
            Counters::Title,
            Counters::Count,
            Counters::UpdatedAt,
        ])
        .from(Counters::Table)
        .and_where(Expr::col(Counters::Id).eq(id))
        .to_owned()
}

pub fn select_counter_ids() -> SelectStatement {
    Query::select()
        .column(Counters::Id)
        .from(Counters::Table)
        .order_by(Counters::Id, Order::Asc)
        .to_owned()
}

/// Existence check for a counter row. PostgreSQL adds `FOR UPDATE` to it.
pub fn select_counter_id(id: &str) -> SelectStatement {
    Query::select()
        .column(Counters::Id)
        .from(Counters::Table)
        .and_where(Expr::col(Counters::Id).eq(id))
        .to_owned()
}

/// `MAX(created_at)` over a counter's events; NULL when it has none.
pub fn select_last_event_at(counter_id: &str) -> SelectStatement {
    Query::select()
        .expr(Expr::col(Events::CreatedAt).max())
        .from(Events::Table)
        .and_where(Expr::col(Events::CounterId).eq(counter_id))
        .to_owned()
}

/// `count = count + 1, updated_at = now`.
pub fn bump_counter(id: &str, updated_at: &str) -> UpdateStatement {
    Query::update()
        .table(Counters::Table)
        .value(Counters::Count, Expr::col(Counters::Count).add(1))
        .value(Counters::UpdatedAt, updated_at)
        .and_where(Expr::col(Counters::Id).eq(id))
        .to_owned()
}

pub fn select_event_ids(counter_id: &str) -> SelectStatement {
    Query::select()
        .column(Events::Id)
        .from(Events::Table)
        .and_where(Expr::col(Events::CounterId).eq(counter_id))
        .order_by(Events::Seq, Order::Asc)
        .to_owned()
}

pub fn select_event(id: &str) -> SelectStatement {
    Query::select()
        .columns([
            Events::Id,
            Events::CounterId,
            Events::Title,
            Events::DurationNanos,
            Events::CreatedAt,
        ])
        .from(Events::Table)
        .and_where(Expr::col(Events::Id).eq(id))
        .to_owned()
}

pub fn delete_events(counter_id: &str) -> DeleteStatement {
    Query::delete()
        .from_table(Events::Table)
        .and_where(Expr::col(Events::CounterId).eq(counter_id))
        .to_owned()
}

pub fn delete_counter(id: &str) -> DeleteStatement {
    Query::delete()
        .from_table(Counters::Table)
        .and_where(Expr::col(Counters::Id).eq(id))
        .to_owned()
}

/// Decode a row produced by [`select_counter`].
pub fn counter_from_row<'r, R>(row: &'r R) -> Result<Counter>
where
    R: Row,
    &'static str: ColumnIndex<R>,
    String: Decode<'r, R::Database> + Type<R::Database>,
    i64: Decode<'r, R::Database> + Type<R::Database>,
{
    let updated_at: String = row.try_get("updated_at")?;
    Ok(Counter {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        count: row.try_get("count")?,
        timestamp: parse_instant(&updated_at)?,
    })
}

/// Decode a row produced by [`select_event`].
pub fn event_from_row<'r, R>(row: &'r R) -> Result<Event>
where
    R: Row,
    &'static str: ColumnIndex<R>,
    String: Decode<'r, R::Database> + Type<R::Database>,
    Option<i64>: Decode<'r, R::Database> + Type<R::Database>,
{
    let created_at: String = row.try_get("created_at")?;
    let duration_nanos: Option<i64> = row.try_get("duration_nanos")?;
    Ok(Event {
        id: row.try_get("id")?,
        counter_id: row.try_get("counter_id")?,
        title: row.try_get("title")?,
        duration: duration_nanos.map(nanos_to_duration),
        created_at: parse_instant(&created_at)?,
    })
}

/// Decode a single `id` column.
pub fn id_from_row<'r, R>(row: &'r R) -> Result<String>
where
    R: Row,
    usize: ColumnIndex<R>,
    String: Decode<'r, R::Database> + Type<R::Database>,
{
    Ok(row.try_get(0usize)?)
}

/// Decode the `MAX(created_at)` aggregate.
pub fn last_event_at_from_row<'r, R>(row: &'r R) -> Result<Option<chrono::DateTime<chrono::Utc>>>
where
    R: Row,
    usize: ColumnIndex<R>,
    Option<String>: Decode<'r, R::Database> + Type<R::Database>,
{
    let max: Option<String> = row.try_get(0usize)?;
    max.as_deref().map(parse_instant).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_query::{PostgresQueryBuilder, SqliteQueryBuilder};

    #[test]
    fn test_bump_counter_increments_in_place() {
        let sql = bump_counter("c1", "2026-01-01T00:00:00.000000000Z").to_string(SqliteQueryBuilder);
        assert!(sql.starts_with("UPDATE \"counters\""));
        assert!(sql.contains("\"count\" + 1"));
        assert!(sql.contains("'c1'"));
    }

    #[test]
    fn test_last_event_at_uses_max() {
        let sql = select_last_event_at("c1").to_string(PostgresQueryBuilder);
        assert!(sql.contains("MAX(\"created_at\")"));
        assert!(sql.contains("\"counter_id\" = 'c1'"));
    }

    #[test]
    fn test_event_ids_ordered_by_chain_position() {
        let sql = select_event_ids("c1").to_string(SqliteQueryBuilder);
        assert!(sql.ends_with("ORDER BY \"seq\" ASC"));
    }

    #[test]
    fn test_insert_first_event_has_null_duration() {
        let event = Event {
            id: "e1".to_string(),
            title: "init".to_string(),
            counter_id: "c1".to_string(),
            duration: None,
            created_at: chrono::Utc::now(),
        };
        let sql = insert_event(&event, 1, "2026-01-01T00:00:00.000000000Z").to_string(SqliteQueryBuilder);
        assert!(sql.contains("NULL"));
    }

    #[test]
    fn test_titles_are_escaped() {
        let sql = select_counter("it's").to_string(PostgresQueryBuilder);
        assert!(sql.contains("'it''s'") || sql.contains("E'it\\'s'"));
    }
}
