//! Core domain types and abstractions for the staycal booking calendar.
//!
//! This crate defines the pieces every other staycal crate builds on:
//!
//! - [`booking`]: the [`BookingEvent`] domain event and the persisted
//!   [`CalendarRecord`], plus the deterministic summary rendering shared by
//!   the ingestion and read paths.
//! - [`message`]: translation from a raw broker payload into a validated
//!   [`BookingEvent`].
//! - [`store`]: the [`CalendarStore`] trait — the only surface through which
//!   calendar records are read or written.
//! - [`memory`]: an in-memory [`CalendarStore`] for fast, deterministic tests.
//!
//! # Conflict model
//!
//! A calendar record's identity for conflict detection is its
//! `(dtstart, dtend)` pair, **not** its `uid`. The `uid` is rewritten whenever
//! a later booking message lands on the same date range. This is inherited
//! behavior from the upstream booking system and is preserved deliberately;
//! see [`CalendarRecord`] for the details.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod booking;
pub mod memory;
pub mod message;
pub mod store;

// Re-export key types for convenience
pub use booking::{render_summary, BookingEvent, CalendarRecord};
pub use memory::InMemoryCalendarStore;
pub use message::{translate, TranslationError};
pub use store::{CalendarStore, StoreError, UpsertOutcome};
