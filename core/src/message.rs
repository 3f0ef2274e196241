//! Translation of raw broker payloads into [`BookingEvent`]s.
//!
//! The broker delivers JSON bodies of the shape:
//!
//! ```json
//! {
//!   "type": "created",
//!   "payload": {
//!     "id": "b1",
//!     "start": "2024-06-01",
//!     "end": "2024-06-05",
//!     "customer": "Alice",
//!     "cabin": "Pine"
//!   }
//! }
//! ```
//!
//! Translation is pure: it never touches the store, and it validates dates
//! only for syntactic parseability (`YYYY-MM-DD`). Semantic validation, such
//! as it exists, is the reconciliation engine's concern.

use crate::booking::BookingEvent;
use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while translating a raw broker message.
///
/// Translation errors are non-retriable: the same bytes will fail the same
/// way every time, so the caller should report the message and skip it rather
/// than reprocess it.
#[derive(Error, Debug)]
pub enum TranslationError {
    /// The payload is not valid JSON or does not match the expected shape
    /// (missing `type`, missing `payload`, or missing required fields).
    #[error("Malformed booking message: {0}")]
    Malformed(String),

    /// A required date field was present but not parseable as `YYYY-MM-DD`.
    #[error("Unparseable {field} date {value:?}")]
    InvalidDate {
        /// Which field failed to parse (`start` or `end`).
        field: &'static str,
        /// The offending raw value.
        value: String,
    },
}

/// Wire representation of a booking message.
#[derive(Debug, Deserialize)]
struct RawBookingMessage {
    #[serde(rename = "type")]
    event_type: String,
    payload: RawBookingPayload,
}

/// Wire representation of the nested booking payload.
#[derive(Debug, Deserialize)]
struct RawBookingPayload {
    id: String,
    start: String,
    end: String,
    customer: String,
    cabin: String,
}

/// Translate a raw message body into a validated [`BookingEvent`].
///
/// # Errors
///
/// Returns [`TranslationError::Malformed`] when the body cannot be parsed
/// into the expected structure, and [`TranslationError::InvalidDate`] when a
/// date field does not parse as `YYYY-MM-DD`.
///
/// # Examples
///
/// ```
/// use staycal_core::message::translate;
///
/// let body = br#"{"type":"created","payload":{"id":"b1","start":"2024-06-01","end":"2024-06-05","customer":"Alice","cabin":"Pine"}}"#;
/// let event = translate(body)?;
/// assert_eq!(event.id, "b1");
/// assert_eq!(event.event_type, "created");
/// # Ok::<(), staycal_core::message::TranslationError>(())
/// ```
pub fn translate(body: &[u8]) -> Result<BookingEvent, TranslationError> {
    let raw: RawBookingMessage = serde_json::from_slice(body)
        .map_err(|e| TranslationError::Malformed(e.to_string()))?;

    let start = parse_date("start", &raw.payload.start)?;
    let end = parse_date("end", &raw.payload.end)?;

    Ok(BookingEvent {
        id: raw.payload.id,
        start,
        end,
        customer: raw.payload.customer,
        cabin: raw.payload.cabin,
        event_type: raw.event_type,
    })
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, TranslationError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| TranslationError::InvalidDate {
        field,
        value: value.to_string(),
    })
}
