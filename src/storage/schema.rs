//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.
//! The tables themselves are created by the migrations under `migrations/`.

use sea_query::Iden;

/// Counters table schema.
#[derive(Iden)]
pub enum Counters {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "title"]
    Title,
    #[iden = "count"]
    Count,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// Events table schema.
#[derive(Iden)]
pub enum Events {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "counter_id"]
    CounterId,
    #[iden = "title"]
    Title,
    #[iden = "seq"]
    Seq,
    #[iden = "duration_nanos"]
    DurationNanos,
    #[iden = "created_at"]
    CreatedAt,
}
