//! The ingestion loop: an explicit state machine over the broker connection.
//!
//! # States
//!
//! ```text
//! Disconnected → Connecting → Listening ──────────────→ Closed
//!                    ↑  │         │        (shutdown)      ↑
//!                    │  │         └─(drop)──→ Connecting   │
//!                    │  └─(budget exhausted)→ Faulted ─────┘
//!                    └────────(cooldown elapsed)┘ (shutdown)
//! ```
//!
//! - `Connecting`: bounded attempts with a fixed inter-attempt delay against
//!   the injected [`BrokerTransport`].
//! - `Listening`: deliveries are handled strictly one at a time in delivery
//!   order. Each is acked immediately on receipt, then translated and
//!   reconciled. Per-message failures never stop the loop.
//! - `Faulted`: the circuit is open; connection attempts pause for a cooldown
//!   window before returning to `Connecting`.
//! - `Closed`: terminal, entered on the shutdown signal. In-flight message
//!   processing completes, then the subscription and connection are released.
//!
//! The state machine is driven entirely through the transport trait, so its
//! behavior is testable without a live broker.

use crate::reconcile::{ReconcileOutcome, ReconciliationEngine};
use crate::retry::{retry_store_call, StoreCallPolicy};
use metrics::counter;
use staycal_amqp::{BrokerDelivery, BrokerSubscription, BrokerTransport, QueueBinding};
use staycal_core::{translate, CalendarStore, StoreError, TranslationError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, RwLock};
use tokio::time::sleep;

/// Connection lifecycle state of the ingestion loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initial state; no connection attempt has been made yet.
    Disconnected,
    /// Establishing the subscription, with a bounded attempt budget.
    Connecting,
    /// Subscribed; processing deliveries serially.
    Listening,
    /// Connect budget exhausted; the circuit is open for the cooldown window.
    Faulted,
    /// Terminal state after the shutdown signal.
    Closed,
}

/// Configuration for the ingestion loop.
///
/// Defaults mirror the upstream service's broker options: 5 connect attempts
/// two seconds apart, then a 30 second circuit cooldown.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Exchange/queue/routing-key triple to subscribe to.
    pub binding: QueueBinding,
    /// Connect attempts per `Connecting` phase before the circuit opens.
    pub connect_attempts: usize,
    /// Fixed delay between connect attempts.
    pub connect_delay: Duration,
    /// How long the circuit stays open in `Faulted`.
    pub cooldown: Duration,
    /// Retry/timeout policy for store calls made per message.
    pub store_policy: StoreCallPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            binding: QueueBinding::default(),
            connect_attempts: 5,
            connect_delay: Duration::from_secs(2),
            cooldown: Duration::from_secs(30),
            store_policy: StoreCallPolicy::default(),
        }
    }
}

/// Per-message ingestion failure.
///
/// Both variants are reported and counted, never fatal: the delivery was
/// already acknowledged, so the loop's only options are to record the loss
/// and continue.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The message body could not be translated; reported and skipped.
    #[error(transparent)]
    Translation(#[from] TranslationError),

    /// The store rejected the write after the retry budget; message lost.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why the listen phase ended.
enum ListenExit {
    /// Subscription dropped or was closed by the broker; reconnect.
    Reconnect,
    /// Shutdown signal observed; the loop is done.
    Shutdown,
}

/// Outcome of a `Connecting` phase.
enum ConnectOutcome {
    /// Subscription established.
    Connected(Box<dyn BrokerSubscription>),
    /// Attempt budget exhausted; open the circuit.
    Exhausted,
    /// Shutdown signal observed while waiting between attempts.
    Shutdown,
}

/// Owns the broker connection lifecycle and drives
/// translate → reconcile → store for every delivered message.
///
/// Constructed once at startup; all lifecycle state lives in explicit fields
/// with a start ([`IngestionLoop::run`]) / stop (shutdown signal) contract.
pub struct IngestionLoop {
    transport: Arc<dyn BrokerTransport>,
    engine: ReconciliationEngine,
    config: IngestConfig,
    state: RwLock<ConnectionState>,
}

impl IngestionLoop {
    /// Create a loop over the given transport and store.
    #[must_use]
    pub fn new(
        transport: Arc<dyn BrokerTransport>,
        store: Arc<dyn CalendarStore>,
        config: IngestConfig,
    ) -> Self {
        Self {
            transport,
            engine: ReconciliationEngine::new(store),
            config,
            state: RwLock::new(ConnectionState::Disconnected),
        }
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Run until the shutdown signal fires.
    ///
    /// Send `true` through the paired [`watch::Sender`] (or drop it) to stop
    /// the loop; the current message finishes processing, the subscription is
    /// released, and the state settles at [`ConnectionState::Closed`].
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                self.transition(ConnectionState::Closed).await;
                return;
            }

            self.transition(ConnectionState::Connecting).await;
            match self.connect_with_retries(&mut shutdown).await {
                ConnectOutcome::Connected(subscription) => {
                    self.transition(ConnectionState::Listening).await;
                    if let ListenExit::Shutdown = self.listen(subscription, &mut shutdown).await {
                        self.transition(ConnectionState::Closed).await;
                        return;
                    }
                    // Subscription dropped: go around and reconnect.
                }
                ConnectOutcome::Exhausted => {
                    self.transition(ConnectionState::Faulted).await;
                    counter!("staycal_circuit_opened").increment(1);
                    tracing::warn!(
                        cooldown_ms = self.config.cooldown.as_millis(),
                        "Connect retry budget exhausted, circuit open"
                    );

                    tokio::select! {
                        () = shutdown_signal(&mut shutdown) => {
                            self.transition(ConnectionState::Closed).await;
                            return;
                        }
                        () = sleep(self.config.cooldown) => {}
                    }
                }
                ConnectOutcome::Shutdown => {
                    self.transition(ConnectionState::Closed).await;
                    return;
                }
            }
        }
    }

    async fn connect_with_retries(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ConnectOutcome {
        for attempt in 1..=self.config.connect_attempts {
            match self.transport.subscribe(&self.config.binding).await {
                Ok(subscription) => {
                    counter!("staycal_broker_connects").increment(1);
                    return ConnectOutcome::Connected(subscription);
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.config.connect_attempts,
                        error = %e,
                        "Broker connect attempt failed"
                    );

                    if attempt < self.config.connect_attempts {
                        tokio::select! {
                            () = shutdown_signal(shutdown) => return ConnectOutcome::Shutdown,
                            () = sleep(self.config.connect_delay) => {}
                        }
                    }
                }
            }
        }

        ConnectOutcome::Exhausted
    }

    async fn listen(
        &self,
        mut subscription: Box<dyn BrokerSubscription>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ListenExit {
        loop {
            // Racing the listen wait against shutdown only cancels the *wait*;
            // once a delivery is in hand it is processed to completion below,
            // outside the select, so shutdown cannot abort a write mid-flight.
            let next = tokio::select! {
                () = shutdown_signal(shutdown) => None,
                next = subscription.next_delivery() => Some(next),
            };

            match next {
                None => {
                    close_subscription(subscription).await;
                    return ListenExit::Shutdown;
                }
                Some(Ok(Some(delivery))) => {
                    self.handle_delivery(subscription.as_mut(), delivery).await;
                }
                Some(Ok(None)) => {
                    tracing::info!("Broker closed the subscription, reconnecting");
                    close_subscription(subscription).await;
                    return ListenExit::Reconnect;
                }
                Some(Err(e)) => {
                    counter!("staycal_broker_drops").increment(1);
                    tracing::warn!(error = %e, "Broker connection dropped, reconnecting");
                    close_subscription(subscription).await;
                    return ListenExit::Reconnect;
                }
            }
        }
    }

    async fn handle_delivery(
        &self,
        subscription: &mut dyn BrokerSubscription,
        delivery: BrokerDelivery,
    ) {
        // Ack before processing (at-least-once): a failure past this point is
        // a permanent loss for this message and is reported as such.
        if let Err(e) = subscription.ack(delivery.delivery_tag).await {
            tracing::warn!(
                delivery_tag = delivery.delivery_tag,
                error = %e,
                "Failed to ack delivery (broker may redeliver)"
            );
        }

        match self.process(&delivery.body).await {
            Ok(outcome) => {
                counter!("staycal_messages_processed").increment(1);
                tracing::info!(?outcome, "Processed booking message");
            }
            Err(IngestError::Translation(e)) => {
                counter!("staycal_messages_skipped").increment(1);
                tracing::warn!(error = %e, "Skipping malformed message");
            }
            Err(IngestError::Store(e)) => {
                counter!("staycal_messages_lost").increment(1);
                tracing::error!(
                    error = %e,
                    "Message lost: store rejected write after retries (delivery was already acked)"
                );
            }
        }
    }

    /// Translate and reconcile one message body.
    async fn process(&self, body: &[u8]) -> Result<ReconcileOutcome, IngestError> {
        let event = translate(body)?;

        let outcome = retry_store_call(&self.config.store_policy, || {
            self.engine.reconcile(&event)
        })
        .await?;

        tracing::debug!(booking = %event.id, ?outcome, "Reconciled booking");
        Ok(outcome)
    }

    async fn transition(&self, next: ConnectionState) {
        let mut state = self.state.write().await;
        if *state != next {
            tracing::info!(from = ?*state, to = ?next, "Ingestion loop state change");
            *state = next;
        }
    }
}

/// Best-effort release of a subscription that is no longer listened to.
///
/// Dropping the box without closing would abandon the underlying
/// connection; a teardown failure only gets a warning since the loop is
/// leaving this subscription behind either way.
async fn close_subscription(subscription: Box<dyn BrokerSubscription>) {
    if let Err(e) = subscription.close().await {
        tracing::warn!(error = %e, "Error while closing broker subscription");
    }
}

/// Resolve when the shutdown signal fires (or its sender is dropped).
async fn shutdown_signal(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
