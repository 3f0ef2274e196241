//! Conflict resolution for incoming booking events.
//!
//! The engine encodes the system's only business rule, so the algorithm is
//! reproduced exactly from the upstream service:
//!
//! 1. Look up an existing record by `(event.start, event.end)`.
//! 2. If none exists: upsert with `uid = event.id` — an insert.
//! 3. If one exists: compare `(dtstart, dtend, summary)` against the incoming
//!    values. All equal → no-op, no write issued. Any difference → upsert
//!    that overwrites `uid`, `dtstart`, `dtend` and `summary` of the existing
//!    row; the incoming id becomes the record's new `uid`.
//!
//! Since the lookup key *is* the date pair, the dates always match on the
//! no-op path; in practice only the summary can differ. The defensive date
//! comparison is kept anyway, mirroring the original.
//!
//! # Known design risk
//!
//! Matching is keyed on `(start, end)`, not on the external id: two distinct
//! bookings that happen to share exact start/end timestamps collide, and the
//! second overwrites the first's `uid` and summary. This is inherited
//! behavior, preserved deliberately rather than "fixed" — see DESIGN.md.

use staycal_core::{BookingEvent, CalendarStore, StoreError, UpsertOutcome};
use std::sync::Arc;

/// What reconciling a booking event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// First message for this `(start, end)` range; a record was inserted.
    Inserted,
    /// A record existed and was overwritten (including its `uid`).
    Updated,
    /// A record existed with identical fields; no write was issued.
    Unchanged,
}

impl From<UpsertOutcome> for ReconcileOutcome {
    fn from(outcome: UpsertOutcome) -> Self {
        match outcome {
            UpsertOutcome::Inserted => Self::Inserted,
            UpsertOutcome::Updated => Self::Updated,
            UpsertOutcome::Unchanged => Self::Unchanged,
        }
    }
}

/// Decides the write to issue against the store for an incoming event.
///
/// Holds no persistent state of its own: it reads current state through the
/// store's query surface and issues write intents through its upsert.
#[derive(Clone)]
pub struct ReconciliationEngine {
    store: Arc<dyn CalendarStore>,
}

impl ReconciliationEngine {
    /// Create an engine over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn CalendarStore>) -> Self {
        Self { store }
    }

    /// Reconcile one booking event against current store state.
    ///
    /// Issues at most one write. The no-op case issues none, which is what
    /// makes redelivered messages (at-least-once broker semantics) harmless.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] from the lookup or the upsert unchanged;
    /// retry policy is the caller's concern.
    pub async fn reconcile(&self, event: &BookingEvent) -> Result<ReconcileOutcome, StoreError> {
        let start = event.dtstart();
        let end = event.dtend();
        let summary = event.summary();

        let existing = self.store.find_by_range(start, end).await?;

        match existing {
            Some(record)
                if record.dtstart == start && record.dtend == end && record.summary == summary =>
            {
                tracing::debug!(uid = %record.uid, "Booking already current, no write issued");
                Ok(ReconcileOutcome::Unchanged)
            }
            _ => {
                let outcome = self
                    .store
                    .upsert(event.id.clone(), start, end, summary)
                    .await?;
                Ok(outcome.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use staycal_core::InMemoryCalendarStore;

    fn event(id: &str, cabin: &str, customer: &str) -> BookingEvent {
        #[allow(clippy::unwrap_used)] // Test fixture with valid literal dates
        let date = |day| NaiveDate::from_ymd_opt(2024, 6, day).unwrap();
        BookingEvent {
            id: id.to_string(),
            start: date(1),
            end: date(5),
            customer: customer.to_string(),
            cabin: cabin.to_string(),
            event_type: "created".to_string(),
        }
    }

    #[tokio::test]
    async fn first_event_inserts_record() {
        let store = Arc::new(InMemoryCalendarStore::new());
        let engine = ReconciliationEngine::new(Arc::clone(&store) as Arc<dyn CalendarStore>);

        let outcome = engine.reconcile(&event("b1", "Pine", "Alice")).await;
        assert!(matches!(outcome, Ok(ReconcileOutcome::Inserted)));

        let records = store.list_all().await;
        assert!(
            matches!(records, Ok(ref rs) if rs.len() == 1
                && rs[0].uid == "b1"
                && rs[0].summary == "type: created cabin:Pine customer: Alice"),
            "stored record matches the worked example"
        );
    }

    #[tokio::test]
    async fn reconciling_twice_is_idempotent() {
        let store = Arc::new(InMemoryCalendarStore::new());
        let engine = ReconciliationEngine::new(Arc::clone(&store) as Arc<dyn CalendarStore>);
        let booking = event("b1", "Pine", "Alice");

        let first = engine.reconcile(&booking).await;
        assert!(matches!(first, Ok(ReconcileOutcome::Inserted)));

        let second = engine.reconcile(&booking).await;
        assert!(matches!(second, Ok(ReconcileOutcome::Unchanged)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn second_booking_with_same_dates_overwrites_first() {
        // Known design risk, preserved deliberately: the date range is the
        // conflict key, so a different booking on the same dates takes over
        // the existing row.
        let store = Arc::new(InMemoryCalendarStore::new());
        let engine = ReconciliationEngine::new(Arc::clone(&store) as Arc<dyn CalendarStore>);

        let first = engine.reconcile(&event("b1", "Pine", "Alice")).await;
        assert!(first.is_ok());

        let outcome = engine.reconcile(&event("b2", "Oak", "Alice")).await;
        assert!(matches!(outcome, Ok(ReconcileOutcome::Updated)));

        let records = store.list_all().await;
        assert!(
            matches!(records, Ok(ref rs) if rs.len() == 1
                && rs[0].uid == "b2"
                && rs[0].summary == "type: created cabin:Oak customer: Alice"),
            "same row, uid rewritten to the new booking's id"
        );
    }

    #[tokio::test]
    async fn no_two_records_share_a_date_range() {
        let store = Arc::new(InMemoryCalendarStore::new());
        let engine = ReconciliationEngine::new(Arc::clone(&store) as Arc<dyn CalendarStore>);

        for id in ["b1", "b2", "b3"] {
            let result = engine.reconcile(&event(id, "Pine", "Alice")).await;
            assert!(result.is_ok());
        }

        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn store_errors_propagate_unchanged() {
        let store = Arc::new(InMemoryCalendarStore::new());
        store.fail_next(1);
        let engine = ReconciliationEngine::new(Arc::clone(&store) as Arc<dyn CalendarStore>);

        let result = engine.reconcile(&event("b1", "Pine", "Alice")).await;
        assert!(matches!(result, Err(StoreError::Connection(_))));
    }
}
