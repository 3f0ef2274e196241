//! Reliable ingestion pipeline for staycal.
//!
//! This crate owns the only part of the system with real failure-handling and
//! consistency concerns:
//!
//! - [`reconcile`]: decides insert vs. update vs. no-op for an incoming
//!   booking event against current store state.
//! - [`retry`]: bounded, fixed-delay retry with a per-call timeout for store
//!   operations.
//! - [`pipeline`]: the [`IngestionLoop`] — an explicit connection state
//!   machine (`Connecting | Listening | Faulted | Closed`) over an injected
//!   broker transport, driving translate → reconcile → store for every
//!   message.
//!
//! # Failure Philosophy
//!
//! Nothing in the ingestion path terminates the process. Connection failures
//! are retried and then circuit-broken; malformed messages are reported and
//! skipped; store faults are retried a bounded number of times and, if
//! exhausted, reported as a lost message (the delivery was already acked).
//! Failures are observability events — logs and metrics — since there is no
//! synchronous caller to report to.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod pipeline;
pub mod reconcile;
pub mod retry;

// Re-export key types for convenience
pub use pipeline::{ConnectionState, IngestConfig, IngestError, IngestionLoop};
pub use reconcile::{ReconcileOutcome, ReconciliationEngine};
pub use retry::{retry_store_call, StoreCallPolicy};
