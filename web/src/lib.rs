//! Read-only HTTP surface for staycal.
//!
//! One endpoint matters: `GET /calendar/ical.ics`, which renders every
//! stored booking as an iCalendar document. The web layer never writes —
//! all mutation flows through the ingestion pipeline — so handlers see the
//! store purely as a query surface behind [`AppState`].
//!
//! # Routes
//!
//! | Method | Path                 | Purpose                       |
//! |--------|----------------------|-------------------------------|
//! | GET    | `/calendar/ical.ics` | Full booking calendar (iCal)  |
//! | GET    | `/health`            | Liveness probe                |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod handlers;
pub mod ical;
pub mod state;

pub use error::AppError;
pub use state::AppState;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

/// Build the application router over the given state.
///
/// Request/response logging comes from `tower-http`'s `TraceLayer`; the
/// handlers themselves only log store interaction.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/calendar/ical.ics", get(handlers::ical_feed))
        .route("/health", get(handlers::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
