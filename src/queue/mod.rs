//! Rate-limited delivery queue.
//!
//! Outbound messages are sent one at a time, in FIFO order, by a single
//! dispatch loop. Successive sends are spaced by at least the configured
//! minimum interval. A rate-limit signal from the transport opens a global
//! backoff window and puts the limited message back at the *front* of the
//! queue, so nothing enqueued later can overtake it. Any other failure is
//! terminal for that message: it is logged, kept in a bounded dead-letter
//! list and the loop moves on.
//!
//! # Example
//!
//! ```rust,ignore
//! let queue = Arc::new(DeliveryQueue::new(transport, QueueConfig::default()));
//! queue.enqueue(PendingMessage::new("-100123", "hello", RenderOptions::default()));
//! ```

mod backoff;

pub use backoff::{clamp_retry_after, BackoffState, MAX_RETRY_AFTER, MIN_RETRY_AFTER};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Notify;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::metrics::DeliveryMetrics;
use crate::transport::{DeliveryError, RenderOptions, Transport};

/// Characters of a message body included in log lines
const LOG_PREVIEW_CHARS: usize = 120;

/// One unit of outbound work. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct PendingMessage {
    id: Uuid,
    destination: String,
    body: String,
    options: RenderOptions,
    /// Diagnostics only; ordering is decided by queue position
    enqueued_at: DateTime<Utc>,
}

impl PendingMessage {
    pub fn new(
        destination: impl Into<String>,
        body: impl Into<String>,
        options: RenderOptions,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            destination: destination.into(),
            body: body.into(),
            options,
            enqueued_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    fn preview(&self) -> String {
        self.body.chars().take(LOG_PREVIEW_CHARS).collect()
    }
}

/// A message abandoned after a non-retryable failure
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    pub message: PendingMessage,
    pub reason: String,
    pub abandoned_at: DateTime<Utc>,
}

/// Snapshot of the queue
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub depth: usize,
    pub dispatching: bool,
    pub in_flight: bool,
    pub backing_off: bool,
    pub backoff_remaining_ms: u64,
    pub delivered: u64,
    pub rate_limited: u64,
    pub abandoned: u64,
    pub dead_letters: usize,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<PendingMessage>,
    backoff: BackoffState,
    /// Set while a dispatch loop instance exists
    dispatching: bool,
    in_flight: bool,
    delivered: u64,
    rate_limited: u64,
    abandoned: u64,
    dead_letters: VecDeque<DeadLetter>,
}

/// Single-consumer outbound queue in front of a [`Transport`].
///
/// The state lock is never held across an await point; the dispatch loop is
/// the only caller of [`Transport::send`].
pub struct DeliveryQueue {
    transport: Arc<dyn Transport>,
    config: QueueConfig,
    state: Mutex<QueueState>,
    idle: Notify,
}

impl DeliveryQueue {
    pub fn new(transport: Arc<dyn Transport>, config: QueueConfig) -> Self {
        Self {
            transport,
            config,
            state: Mutex::new(QueueState::default()),
            idle: Notify::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a message and wake the dispatch loop if it is idle.
    ///
    /// Never fails; the caller is not told about the eventual outcome.
    pub fn enqueue(self: &Arc<Self>, message: PendingMessage) {
        let message_id = message.id();
        let depth = {
            let mut state = self.state();
            state.pending.push_back(message);
            state.pending.len()
        };
        DeliveryMetrics::record_enqueued(depth);

        tracing::debug!(
            message_id = %message_id,
            queue_depth = depth,
            "Message enqueued"
        );

        self.start_dispatch();
    }

    /// Start the dispatch loop unless one is already running or there is
    /// nothing to send. Returns whether a new loop was spawned.
    pub fn start_dispatch(self: &Arc<Self>) -> bool {
        {
            let mut state = self.state();
            if state.dispatching || state.pending.is_empty() {
                return false;
            }
            state.dispatching = true;
        }

        let queue = Arc::clone(self);
        tokio::spawn(async move {
            queue.dispatch_loop().await;
        });
        true
    }

    async fn dispatch_loop(self: Arc<Self>) {
        tracing::debug!(transport = %self.transport.name(), "Dispatch loop started");

        let min_interval = self.config.min_interval();
        let mut consecutive_limits: u32 = 0;

        loop {
            let resume_at = {
                let mut state = self.state();
                if state.pending.is_empty() {
                    // Cleared under the same lock enqueue checks, so no wakeup is lost
                    state.dispatching = false;
                    break;
                }
                state.backoff.resume_at()
            };

            if let Some(resume_at) = resume_at {
                if Instant::now() < resume_at {
                    tokio::time::sleep_until(resume_at).await;
                }
            }

            let message = {
                let mut state = self.state();
                let Some(message) = state.pending.pop_front() else {
                    continue;
                };
                state.in_flight = true;
                DeliveryMetrics::record_depth(state.pending.len());
                message
            };

            let started = Instant::now();
            let outcome = self
                .transport
                .send(message.destination(), message.body(), message.options())
                .await;
            let latency = started.elapsed();

            match outcome {
                Ok(()) => {
                    consecutive_limits = 0;
                    {
                        let mut state = self.state();
                        state.in_flight = false;
                        state.delivered += 1;
                    }
                    DeliveryMetrics::record_delivered(latency);

                    tracing::debug!(
                        message_id = %message.id(),
                        latency_ms = latency.as_millis() as u64,
                        "Message delivered"
                    );

                    tokio::time::sleep(min_interval).await;
                }
                Err(DeliveryError::RateLimited { retry_after }) => {
                    consecutive_limits += 1;
                    let message_id = message.id();
                    let (backoff, depth) = {
                        let mut state = self.state();
                        state.in_flight = false;
                        state.rate_limited += 1;
                        let now = Instant::now();
                        let resume_at = state.backoff.extend(now, retry_after);
                        state.pending.push_front(message);
                        (resume_at - now, state.pending.len())
                    };
                    DeliveryMetrics::record_rate_limited(latency);
                    DeliveryMetrics::record_depth(depth);

                    // The backoff wait at the top of the loop replaces the normal spacing
                    tracing::warn!(
                        message_id = %message_id,
                        retry_after_secs = retry_after.as_secs(),
                        backoff_ms = backoff.as_millis() as u64,
                        consecutive = consecutive_limits,
                        "Rate limited, message requeued at front"
                    );
                }
                Err(DeliveryError::Other(reason)) => {
                    consecutive_limits = 0;

                    tracing::error!(
                        message_id = %message.id(),
                        destination = %message.destination(),
                        body = %message.preview(),
                        error = %reason,
                        "Delivery failed, message abandoned"
                    );

                    {
                        let mut state = self.state();
                        state.in_flight = false;
                        state.abandoned += 1;
                        self.record_dead_letter(&mut state, message, reason);
                    }
                    DeliveryMetrics::record_abandoned(latency);

                    tokio::time::sleep(min_interval).await;
                }
            }
        }

        self.idle.notify_waiters();
        tracing::debug!("Dispatch loop idle");
    }

    fn record_dead_letter(&self, state: &mut QueueState, message: PendingMessage, reason: String) {
        let capacity = self.config.dead_letter_capacity;
        if capacity == 0 {
            return;
        }
        while state.dead_letters.len() >= capacity {
            state.dead_letters.pop_front();
        }
        state.dead_letters.push_back(DeadLetter {
            message,
            reason,
            abandoned_at: Utc::now(),
        });
    }

    /// Number of messages waiting (excluding one in flight)
    pub fn len(&self) -> usize {
        self.state().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// No loop running and nothing pending
    pub fn is_idle(&self) -> bool {
        let state = self.state();
        !state.dispatching && state.pending.is_empty()
    }

    /// Wait until the queue is idle or `limit` elapses. Returns whether the
    /// queue drained.
    pub async fn wait_idle(&self, limit: Duration) -> bool {
        tokio::time::timeout(limit, async {
            loop {
                // Registered before the check so a concurrent notify is not missed
                let notified = self.idle.notified();
                if self.is_idle() {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }

    /// Abandoned messages, oldest first
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state().dead_letters.iter().cloned().collect()
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.state();
        let now = Instant::now();
        QueueStats {
            depth: state.pending.len(),
            dispatching: state.dispatching,
            in_flight: state.in_flight,
            backing_off: state.backoff.is_active(now),
            backoff_remaining_ms: state.backoff.remaining(now).as_millis() as u64,
            delivered: state.delivered,
            rate_limited: state.rate_limited,
            abandoned: state.abandoned,
            dead_letters: state.dead_letters.len(),
        }
    }
}
