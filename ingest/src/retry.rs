//! Bounded retry with a per-call timeout for store operations.
//!
//! Store faults in the ingestion path are retried a fixed number of times
//! with a fixed inter-attempt delay; every attempt runs under a deadline so a
//! slow database cannot block the single consumer indefinitely. Exhausting
//! the budget surfaces the last error to the caller, which reports the
//! message as lost (it was already acknowledged).
//!
//! # Example
//!
//! ```
//! use staycal_ingest::retry::{retry_store_call, StoreCallPolicy};
//! use staycal_core::StoreError;
//!
//! # async fn example() -> Result<(), StoreError> {
//! let policy = StoreCallPolicy::default();
//!
//! let value = retry_store_call(&policy, || async {
//!     Ok::<_, StoreError>(42)
//! }).await?;
//!
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

use staycal_core::StoreError;
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// Retry policy for store calls made by the ingestion loop.
///
/// # Default Values
///
/// - `max_retries`: 3
/// - `retry_delay`: 500ms (fixed, no backoff — the consumer is serial and a
///   growing delay only grows the at-risk window for the acked message)
/// - `call_timeout`: 5 seconds per attempt
#[derive(Debug, Clone)]
pub struct StoreCallPolicy {
    /// Maximum number of retry attempts after the initial call.
    pub max_retries: usize,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
    /// Deadline applied to every individual attempt.
    pub call_timeout: Duration,
}

impl Default for StoreCallPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            call_timeout: Duration::from_secs(5),
        }
    }
}

/// Run a store operation under the given policy.
///
/// Retries only errors [`StoreError::is_retriable`] considers transient
/// (connection loss, timeout); query errors fail immediately since the same
/// statement will fail the same way again.
///
/// # Errors
///
/// Returns the last [`StoreError`] once the budget is exhausted, or the
/// first non-retriable error encountered.
pub async fn retry_store_call<F, Fut, T>(
    policy: &StoreCallPolicy,
    mut operation: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;

    loop {
        let result = match timeout(policy.call_timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(policy.call_timeout)),
        };

        match result {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(attempt, "Store call succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if !err.is_retriable() {
                    tracing::warn!(error = %err, "Store error is not retriable, failing immediately");
                    return Err(err);
                }

                if attempt >= policy.max_retries {
                    tracing::error!(attempt, error = %err, "Store call failed after max retries");
                    return Err(err);
                }

                tracing::warn!(
                    attempt,
                    delay_ms = policy.retry_delay.as_millis(),
                    error = %err,
                    "Store call failed, retrying..."
                );
                sleep(policy.retry_delay).await;
                attempt += 1;
            }
        }
    }
}
