//! Coordinated shutdown.
//!
//! Background tasks are told to stop first so no new messages are produced,
//! then the delivery queue gets a bounded window to drain.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::QueueConfig;
use crate::queue::DeliveryQueue;

#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Time to wait for pending messages to be delivered (default: 10 seconds)
    pub drain_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&QueueConfig> for ShutdownConfig {
    fn from(config: &QueueConfig) -> Self {
        Self {
            drain_timeout: config.drain_timeout(),
        }
    }
}

pub struct GracefulShutdown {
    queue: Arc<DeliveryQueue>,
    shutdown_tx: broadcast::Sender<()>,
    config: ShutdownConfig,
}

impl GracefulShutdown {
    pub fn new(queue: Arc<DeliveryQueue>, shutdown_tx: broadcast::Sender<()>) -> Self {
        Self::with_config(queue, shutdown_tx, ShutdownConfig::default())
    }

    pub fn with_config(
        queue: Arc<DeliveryQueue>,
        shutdown_tx: broadcast::Sender<()>,
        config: ShutdownConfig,
    ) -> Self {
        Self {
            queue,
            shutdown_tx,
            config,
        }
    }

    #[tracing::instrument(
        name = "graceful_shutdown",
        skip(self),
        fields(pending = self.queue.len())
    )]
    pub async fn execute(&self, reason: &str) -> ShutdownResult {
        let start = tokio::time::Instant::now();

        tracing::info!(reason = %reason, "Starting graceful shutdown - Phase 1: Stopping background tasks");
        let _ = self.shutdown_tx.send(());

        tracing::info!(
            drain_timeout_secs = self.config.drain_timeout.as_secs(),
            "Phase 2: Draining delivery queue"
        );
        let queue_drained = self.queue.wait_idle(self.config.drain_timeout).await;
        let messages_left = self.queue.len();

        if queue_drained {
            tracing::info!("Delivery queue drained");
        } else {
            let stats = self.queue.stats();
            tracing::warn!(
                messages_left = messages_left,
                in_flight = stats.in_flight,
                backoff_remaining_ms = stats.backoff_remaining_ms,
                "Drain timeout, pending messages will be lost"
            );
        }

        let duration = start.elapsed();
        tracing::info!(
            duration_ms = duration.as_millis() as u64,
            queue_drained = queue_drained,
            "Graceful shutdown complete"
        );

        ShutdownResult {
            queue_drained,
            messages_left,
            duration,
        }
    }
}

#[derive(Debug, Default)]
pub struct ShutdownResult {
    /// Whether the queue went idle within the drain timeout
    pub queue_drained: bool,
    /// Messages still pending when shutdown gave up
    pub messages_left: usize,
    pub duration: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::queue::PendingMessage;
    use crate::transport::{DeliveryError, RenderOptions, Transport};

    /// Always rate limited
    struct Throttled;

    #[async_trait]
    impl Transport for Throttled {
        fn name(&self) -> &str {
            "throttled"
        }

        async fn send(&self, _: &str, _: &str, _: &RenderOptions) -> Result<(), DeliveryError> {
            Err(DeliveryError::RateLimited {
                retry_after: Duration::from_secs(60),
            })
        }
    }

    struct Immediate;

    #[async_trait]
    impl Transport for Immediate {
        fn name(&self) -> &str {
            "immediate"
        }

        async fn send(&self, _: &str, _: &str, _: &RenderOptions) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    fn queue(transport: Arc<dyn Transport>) -> Arc<DeliveryQueue> {
        Arc::new(DeliveryQueue::new(transport, QueueConfig::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_with_idle_queue() {
        let (tx, mut rx) = broadcast::channel(1);
        let shutdown = GracefulShutdown::new(queue(Arc::new(Immediate)), tx);

        let result = shutdown.execute("test shutdown").await;

        assert!(result.queue_drained);
        assert_eq!(result.messages_left, 0);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_pending_messages() {
        let (tx, _rx) = broadcast::channel(1);
        let queue = queue(Arc::new(Immediate));
        for body in ["a", "b", "c"] {
            queue.enqueue(PendingMessage::new("-100", body, RenderOptions::default()));
        }

        let result = GracefulShutdown::new(queue.clone(), tx).execute("test").await;

        assert!(result.queue_drained);
        assert_eq!(queue.stats().delivered, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_gives_up_after_drain_timeout() {
        let (tx, _rx) = broadcast::channel(1);
        let queue = queue(Arc::new(Throttled));
        queue.enqueue(PendingMessage::new("-100", "a", RenderOptions::default()));
        queue.enqueue(PendingMessage::new("-100", "b", RenderOptions::default()));

        let config = ShutdownConfig {
            drain_timeout: Duration::from_secs(5),
        };
        let result = GracefulShutdown::with_config(queue, tx, config)
            .execute("test")
            .await;

        assert!(!result.queue_drained);
        assert_eq!(result.messages_left, 2);
        assert!(result.duration >= Duration::from_secs(5));
    }

    #[test]
    fn test_shutdown_config_from_queue_config() {
        assert_eq!(ShutdownConfig::default().drain_timeout, Duration::from_secs(10));

        let queue_config = QueueConfig {
            drain_timeout_seconds: 3,
            ..Default::default()
        };
        assert_eq!(
            ShutdownConfig::from(&queue_config).drain_timeout,
            Duration::from_secs(3)
        );
    }
}
