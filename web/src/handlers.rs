//! HTTP handlers for the calendar feed.

use crate::error::AppError;
use crate::ical::render_calendar;
use crate::state::AppState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;

/// Serve the full booking calendar as an iCalendar document.
///
/// Reads are point-in-time: the record list is materialized in one store
/// call before rendering, so a feed never interleaves with concurrent
/// ingestion writes.
///
/// # Endpoint
///
/// ```text
/// GET /calendar/ical.ics
/// ```
///
/// # Errors
///
/// Any store failure surfaces as 500, with the cause logged server-side.
pub async fn ical_feed(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let records = state.store.list_all().await?;

    tracing::debug!(records = records.len(), "Serving calendar feed");

    Ok((
        [(header::CONTENT_TYPE, "text/calendar; charset=utf-8")],
        render_calendar(&records),
    ))
}

/// Simple health check endpoint (for basic liveness).
///
/// Returns 200 OK to indicate the service is running. This endpoint does
/// NOT check dependencies (database, broker).
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
