//! Booking domain events and persisted calendar records.
//!
//! A [`BookingEvent`] is the validated, in-memory form of a message received
//! from the booking broker. A [`CalendarRecord`] is what the store persists
//! and what the calendar feed renders.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// A validated booking-lifecycle event received from the upstream system.
///
/// Produced by [`crate::message::translate`] and consumed by the
/// reconciliation engine. Dates carry day granularity; the stay occupies the
/// range `[start, end]`.
///
/// The `id` is assigned by the upstream booking system and is **not**
/// guaranteed unique across updates to the same stay — conflict detection is
/// keyed on `(start, end)` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingEvent {
    /// Opaque external identifier assigned by the upstream booking system.
    pub id: String,
    /// First day of the stay.
    pub start: NaiveDate,
    /// Last day of the stay.
    pub end: NaiveDate,
    /// Free-text customer name.
    pub customer: String,
    /// Free-text cabin name.
    pub cabin: String,
    /// Event discriminator from the wire message (e.g. "created").
    /// Currently only informs the rendered summary text.
    pub event_type: String,
}

impl BookingEvent {
    /// Render the deterministic summary text for this event.
    ///
    /// See [`render_summary`] for the exact format.
    #[must_use]
    pub fn summary(&self) -> String {
        render_summary(&self.event_type, &self.cabin, &self.customer)
    }

    /// The stay start as a midnight timestamp, matching the stored column.
    #[must_use]
    pub fn dtstart(&self) -> NaiveDateTime {
        self.start.and_time(NaiveTime::MIN)
    }

    /// The stay end as a midnight timestamp, matching the stored column.
    #[must_use]
    pub fn dtend(&self) -> NaiveDateTime {
        self.end.and_time(NaiveTime::MIN)
    }
}

/// Render the summary text stored alongside a calendar record.
///
/// The format is fixed and must not change: downstream calendar clients and
/// the no-op detection in the reconciliation engine both compare against the
/// exact rendered string.
///
/// # Examples
///
/// ```
/// use staycal_core::render_summary;
///
/// let summary = render_summary("created", "Pine", "Alice");
/// assert_eq!(summary, "type: created cabin:Pine customer: Alice");
/// ```
#[must_use]
pub fn render_summary(event_type: &str, cabin: &str, customer: &str) -> String {
    format!("type: {event_type} cabin:{cabin} customer: {customer}")
}

/// A persisted calendar event.
///
/// # Identity
///
/// `uid` is the primary key of the underlying table, but it is **not** stable
/// across the record's lifetime: when a later booking message arrives for the
/// same `(dtstart, dtend)` range with a different external id, the existing
/// row is updated in place and its `uid` is overwritten with the incoming id.
/// The natural key for conflict detection is the `(dtstart, dtend)` pair, and
/// at most one record exists per distinct pair.
///
/// This is a deliberate (if unusual) inherited design choice — two distinct
/// bookings that share exact start/end timestamps will collide, with the
/// second overwriting the first's `uid` and summary.
///
/// Records are never deleted by the ingestion core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarRecord {
    /// Unique key of the row. May be rewritten on update (see type docs).
    pub uid: String,
    /// Rendered free-text description, see [`render_summary`].
    pub summary: String,
    /// Stay start (midnight timestamp).
    pub dtstart: NaiveDateTime,
    /// Stay end (midnight timestamp).
    pub dtend: NaiveDateTime,
}
