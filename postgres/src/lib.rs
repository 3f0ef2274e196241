//! `PostgreSQL` calendar store implementation for staycal.
//!
//! # Overview
//!
//! [`PgCalendarStore`] persists calendar records in a single `events` table
//! and implements the [`CalendarStore`] trait from `staycal-core`:
//!
//! - `find_by_range`: exact-match lookup on the `(dtstart, dtend)` key
//! - `upsert`: transactional insert-or-update serialized per key
//! - `list_all`: bounded materialization of the full record set
//!
//! # Consistency
//!
//! The upsert wraps its read-then-write in a transaction and takes a row lock
//! (`SELECT ... FOR UPDATE`) on the matched range, so two near-simultaneous
//! upserts for the same `(dtstart, dtend)` pair cannot both observe "not
//! found". A unique index on the pair backstops the invariant that at most
//! one record exists per distinct range.
//!
//! # Schema
//!
//! Created idempotently by [`PgCalendarStore::migrate`] at startup:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS events (
//!     uid TEXT NOT NULL PRIMARY KEY,
//!     summary TEXT NOT NULL,
//!     dtstart TIMESTAMP NOT NULL,
//!     dtend TIMESTAMP NOT NULL
//! );
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use chrono::NaiveDateTime;
use sqlx::postgres::{PgPool, PgPoolOptions};
use staycal_core::{CalendarRecord, CalendarStore, StoreError, UpsertOutcome};
use std::future::Future;
use std::pin::Pin;

/// Row tuple as selected from the `events` table.
type EventRow = (String, String, NaiveDateTime, NaiveDateTime);

/// PostgreSQL-backed [`CalendarStore`].
///
/// Cheap to clone; the underlying pool is shared between the ingestion loop
/// and the HTTP read path. Faults are reported as [`StoreError`] and never
/// retried here — retry policy lives in the caller.
#[derive(Clone)]
pub struct PgCalendarStore {
    pool: PgPool,
}

impl PgCalendarStore {
    /// Create a store from an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the database and verify connectivity.
    ///
    /// The connectivity check runs a trivial query so a bad URL or an
    /// unreachable server fails here, at startup, rather than on the first
    /// message.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the pool cannot be created or
    /// the server does not answer.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to connect: {e}")))?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| StoreError::Connection(format!("Connectivity check failed: {e}")))?;

        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    /// Create the `events` table and its range index if absent.
    ///
    /// Safe to run on every startup.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] if schema creation fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS events (
                 uid TEXT NOT NULL PRIMARY KEY,
                 summary TEXT NOT NULL,
                 dtstart TIMESTAMP NOT NULL,
                 dtend TIMESTAMP NOT NULL
             )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to create events table: {e}")))?;

        // Backstop for the one-record-per-range invariant; the upsert's row
        // lock serializes the normal path.
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS events_range_idx
                 ON events (dtstart, dtend)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to create range index: {e}")))?;

        tracing::debug!("Schema migration complete");
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map a sqlx error onto the store error taxonomy.
fn map_sqlx_error(e: &sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Connection(e.to_string())
        }
        _ => StoreError::Query(e.to_string()),
    }
}

fn record_from_row(row: EventRow) -> CalendarRecord {
    let (uid, summary, dtstart, dtend) = row;
    CalendarRecord {
        uid,
        summary,
        dtstart,
        dtend,
    }
}

impl CalendarStore for PgCalendarStore {
    fn find_by_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Pin<Box<dyn Future<Output = Result<Option<CalendarRecord>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let row: Option<EventRow> = sqlx::query_as(
                "SELECT uid, summary, dtstart, dtend FROM events
                 WHERE dtstart = $1 AND dtend = $2",
            )
            .bind(start)
            .bind(end)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(&e))?;

            Ok(row.map(record_from_row))
        })
    }

    fn upsert(
        &self,
        uid: String,
        start: NaiveDateTime,
        end: NaiveDateTime,
        summary: String,
    ) -> Pin<Box<dyn Future<Output = Result<UpsertOutcome, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| map_sqlx_error(&e))?;

            // Row lock on the matched range serializes concurrent upserts
            // for the same key until commit.
            let existing: Option<EventRow> = sqlx::query_as(
                "SELECT uid, summary, dtstart, dtend FROM events
                 WHERE dtstart = $1 AND dtend = $2
                 FOR UPDATE",
            )
            .bind(start)
            .bind(end)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(&e))?;

            let outcome = match existing {
                None => {
                    sqlx::query(
                        "INSERT INTO events (uid, dtstart, dtend, summary)
                         VALUES ($1, $2, $3, $4)",
                    )
                    .bind(&uid)
                    .bind(start)
                    .bind(end)
                    .bind(&summary)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error(&e))?;

                    UpsertOutcome::Inserted
                }
                Some((old_uid, old_summary, old_start, old_end)) => {
                    if old_start == start && old_end == end && old_summary == summary {
                        UpsertOutcome::Unchanged
                    } else {
                        // Keyed by the existing uid; the incoming uid becomes
                        // the row's new identity.
                        sqlx::query(
                            "UPDATE events
                             SET uid = $2, dtstart = $3, dtend = $4, summary = $5
                             WHERE uid = $1",
                        )
                        .bind(&old_uid)
                        .bind(&uid)
                        .bind(start)
                        .bind(end)
                        .bind(&summary)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| map_sqlx_error(&e))?;

                        UpsertOutcome::Updated
                    }
                }
            };

            tx.commit().await.map_err(|e| map_sqlx_error(&e))?;

            tracing::debug!(uid = %uid, ?outcome, "Upsert committed");
            Ok(outcome)
        })
    }

    fn list_all(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<CalendarRecord>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            // Materialized here so no open cursor crosses the store boundary;
            // the pooled connection is returned on every path.
            let rows: Vec<EventRow> =
                sqlx::query_as("SELECT uid, summary, dtstart, dtend FROM events")
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| map_sqlx_error(&e))?;

            Ok(rows.into_iter().map(record_from_row).collect())
        })
    }
}
