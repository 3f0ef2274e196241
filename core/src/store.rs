//! Calendar store trait and related types.
//!
//! This module defines the single abstraction through which calendar records
//! are read or written. The store exclusively owns [`CalendarRecord`] storage;
//! the reconciliation engine only reads through [`CalendarStore::find_by_range`]
//! and issues write intents through [`CalendarStore::upsert`].
//!
//! # Design
//!
//! The trait is deliberately minimal:
//!
//! - Exact-match lookup on the `(dtstart, dtend)` natural key — the sole
//!   conflict-detection primitive.
//! - An atomic insert-or-update keyed on the same pair.
//! - An unordered full scan for the read-only calendar feed.
//!
//! Retry policy lives in the caller: the store reports faults and never
//! retries internally.
//!
//! # Implementations
//!
//! - `PgCalendarStore` (in `staycal-postgres`): production implementation
//! - [`crate::memory::InMemoryCalendarStore`]: fast, deterministic testing
//!
//! # Dyn Compatibility
//!
//! This trait uses explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` to enable trait object usage (`Arc<dyn CalendarStore>`), which
//! is how the ingestion loop and the web layer hold their store handle.

use crate::booking::CalendarRecord;
use chrono::NaiveDateTime;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during calendar store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Could not reach the backing store (pool exhausted, connection lost).
    #[error("Store connection error: {0}")]
    Connection(String),

    /// A query failed (syntax, constraint violation, serialization failure).
    #[error("Store query error: {0}")]
    Query(String),

    /// A store call exceeded its deadline.
    ///
    /// The ingestion loop bounds every store call so a slow database cannot
    /// block the single consumer indefinitely.
    #[error("Store call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl StoreError {
    /// Whether the fault is plausibly transient and worth a bounded retry.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}

/// What an [`CalendarStore::upsert`] call actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record existed for the `(dtstart, dtend)` key; a row was inserted.
    Inserted,
    /// A record existed and differed; its fields (including `uid`) were
    /// overwritten in place.
    Updated,
    /// A record existed with identical fields; nothing was written.
    Unchanged,
}

/// Storage abstraction for persisted calendar records.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the store is shared between the
/// ingestion loop and the concurrent HTTP read path.
///
/// # Consistency
///
/// [`CalendarStore::upsert`] must be atomic with respect to
/// [`CalendarStore::find_by_range`] for the same `(dtstart, dtend)` key: two
/// near-simultaneous upserts for the same key must not both observe "not
/// found" and double-insert. The Postgres implementation serializes the
/// read-then-write in a transaction with a row lock.
pub trait CalendarStore: Send + Sync {
    /// Exact-match lookup on the `(dtstart, dtend)` natural key.
    ///
    /// Returns `Ok(None)` when no record exists for the pair — this is the
    /// normal "first booking for these dates" case, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying storage fault.
    fn find_by_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Pin<Box<dyn Future<Output = Result<Option<CalendarRecord>, StoreError>> + Send + '_>>;

    /// Insert-or-update keyed on `(start, end)`.
    ///
    /// If no record exists for the pair, inserts one with the given `uid` and
    /// `summary`. If one exists and any of `(dtstart, dtend, summary)` differ
    /// from the arguments, overwrites `uid`, `dtstart`, `dtend` and `summary`
    /// in place — the existing row keeps its identity but takes the new
    /// `uid`. If nothing differs, no write is issued.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying storage fault. Faults are not
    /// retried here; the caller owns retry policy.
    fn upsert(
        &self,
        uid: String,
        start: NaiveDateTime,
        end: NaiveDateTime,
        summary: String,
    ) -> Pin<Box<dyn Future<Output = Result<UpsertOutcome, StoreError>> + Send + '_>>;

    /// Unordered full scan of all stored records.
    ///
    /// Rows are materialized inside the store so no open cursor (and no
    /// borrowed connection) crosses this boundary; the caller receives an
    /// owned `Vec` and the connection is released on every exit path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying storage fault.
    fn list_all(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<CalendarRecord>, StoreError>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_and_timeout_errors_are_retriable() {
        assert!(StoreError::Connection("refused".to_string()).is_retriable());
        assert!(StoreError::Timeout(std::time::Duration::from_secs(5)).is_retriable());
        assert!(!StoreError::Query("bad constraint".to_string()).is_retriable());
    }

    #[test]
    fn error_display_includes_cause() {
        let error = StoreError::Query("duplicate key".to_string());
        assert!(format!("{error}").contains("duplicate key"));
    }
}
