//! In-memory calendar store for fast, deterministic tests.
//!
//! Mirrors the Postgres implementation's semantics exactly (including the
//! uid-rewriting update and the `(dtstart, dtend)` uniqueness invariant) so
//! reconciliation and pipeline tests can run at memory speed.

use crate::booking::CalendarRecord;
use crate::store::{CalendarStore, StoreError, UpsertOutcome};
use chrono::NaiveDateTime;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// In-memory [`CalendarStore`] implementation.
///
/// # Fault Injection
///
/// [`InMemoryCalendarStore::fail_next`] arms the store to fail its next N
/// calls with a connection error, which is how the ingestion tests exercise
/// the bounded store-retry path without a real database.
///
/// # Example
///
/// ```
/// use staycal_core::{CalendarStore, InMemoryCalendarStore, UpsertOutcome};
/// use chrono::{NaiveDate, NaiveTime};
///
/// # async fn example() -> Result<(), staycal_core::StoreError> {
/// let store = InMemoryCalendarStore::new();
/// if let Some(day) = NaiveDate::from_ymd_opt(2024, 6, 1) {
///     let at = day.and_time(NaiveTime::MIN);
///     let outcome = store.upsert("b1".into(), at, at, "stay".into()).await?;
///     assert_eq!(outcome, UpsertOutcome::Inserted);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryCalendarStore {
    records: Mutex<Vec<CalendarRecord>>,
    /// Remaining number of calls that should fail with a connection error.
    failures_remaining: AtomicUsize,
}

impl InMemoryCalendarStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the store to fail its next `n` calls with
    /// [`StoreError::Connection`].
    pub fn fail_next(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Number of stored records. Test convenience.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Whether the store holds no records. Test convenience.
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    fn take_failure(&self) -> Result<(), StoreError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0
            && self
                .failures_remaining
                .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            return Err(StoreError::Connection("injected failure".to_string()));
        }
        Ok(())
    }
}

impl CalendarStore for InMemoryCalendarStore {
    fn find_by_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Pin<Box<dyn Future<Output = Result<Option<CalendarRecord>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            self.take_failure()?;
            let records = self.records.lock().await;
            Ok(records
                .iter()
                .find(|r| r.dtstart == start && r.dtend == end)
                .cloned())
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
            self.take_failure()?;
            // The whole read-then-write happens under one lock, matching the
            // per-key serialization the Postgres implementation gets from its
            // transaction and row lock.
            let mut records = self.records.lock().await;
            match records
                .iter_mut()
                .find(|r| r.dtstart == start && r.dtend == end)
            {
                None => {
                    records.push(CalendarRecord {
                        uid,
                        summary,
                        dtstart: start,
                        dtend: end,
                    });
                    Ok(UpsertOutcome::Inserted)
                }
                Some(existing) => {
                    if existing.dtstart == start
                        && existing.dtend == end
                        && existing.summary == summary
                    {
                        Ok(UpsertOutcome::Unchanged)
                    } else {
                        existing.uid = uid;
                        existing.dtstart = start;
                        existing.dtend = end;
                        existing.summary = summary;
                        Ok(UpsertOutcome::Updated)
                    }
                }
            }
        })
    }

    fn list_all(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<CalendarRecord>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            self.take_failure()?;
            let records = self.records.lock().await;
            Ok(records.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn range(start_day: u32, end_day: u32) -> (NaiveDateTime, NaiveDateTime) {
        #[allow(clippy::unwrap_used)] // Test fixture with valid literal dates
        let make = |day| {
            NaiveDate::from_ymd_opt(2024, 6, day)
                .unwrap()
                .and_time(NaiveTime::MIN)
        };
        (make(start_day), make(end_day))
    }

    #[tokio::test]
    async fn upsert_inserts_then_finds() {
        let store = InMemoryCalendarStore::new();
        let (start, end) = range(1, 5);

        let outcome = store
            .upsert("b1".to_string(), start, end, "s".to_string())
            .await;
        assert!(matches!(outcome, Ok(UpsertOutcome::Inserted)));

        let found = store.find_by_range(start, end).await;
        assert!(matches!(found, Ok(Some(ref r)) if r.uid == "b1"));
    }

    #[tokio::test]
    async fn upsert_same_fields_is_unchanged() {
        let store = InMemoryCalendarStore::new();
        let (start, end) = range(1, 5);

        let first = store
            .upsert("b1".to_string(), start, end, "s".to_string())
            .await;
        assert!(matches!(first, Ok(UpsertOutcome::Inserted)));

        let second = store
            .upsert("b1".to_string(), start, end, "s".to_string())
            .await;
        assert!(matches!(second, Ok(UpsertOutcome::Unchanged)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn upsert_different_summary_rewrites_uid() {
        let store = InMemoryCalendarStore::new();
        let (start, end) = range(1, 5);

        let first = store
            .upsert("b1".to_string(), start, end, "old".to_string())
            .await;
        assert!(first.is_ok());

        let second = store
            .upsert("b2".to_string(), start, end, "new".to_string())
            .await;
        assert!(matches!(second, Ok(UpsertOutcome::Updated)));

        let found = store.find_by_range(start, end).await;
        assert!(
            matches!(found, Ok(Some(ref r)) if r.uid == "b2" && r.summary == "new"),
            "row keeps its range but takes the new uid and summary"
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let store = InMemoryCalendarStore::new();
        let (start, end) = range(1, 5);
        store.fail_next(1);

        let failed = store.find_by_range(start, end).await;
        assert!(matches!(failed, Err(StoreError::Connection(_))));

        let ok = store.find_by_range(start, end).await;
        assert!(matches!(ok, Ok(None)));
    }
}
