//! Application state for Axum handlers.

use staycal_core::CalendarStore;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Holds the read side of the system: handlers only ever query the
/// calendar store, never write to it.
#[derive(Clone)]
pub struct AppState {
    /// Calendar store the feed reads from.
    pub store: Arc<dyn CalendarStore>,
}

impl AppState {
    /// Create a new application state over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn CalendarStore>) -> Self {
        Self { store }
    }
}
