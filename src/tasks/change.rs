use tokio::sync::{broadcast, mpsc};

use crate::notification::NotificationProducer;

/// Background task feeding debounced change signals to the producer
pub struct ChangeTask {
    producer: NotificationProducer,
    changes: mpsc::Receiver<()>,
    shutdown: broadcast::Receiver<()>,
}

impl ChangeTask {
    pub fn new(
        producer: NotificationProducer,
        changes: mpsc::Receiver<()>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            producer,
            changes,
            shutdown,
        }
    }

    /// Scan once at startup, then once per change signal.
    pub async fn run(mut self) {
        tracing::info!("Change task started");
        self.producer.on_change().await;

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Change task received shutdown signal");
                    break;
                }
                signal = self.changes.recv() => match signal {
                    Some(()) => {
                        self.producer.on_change().await;
                    }
                    None => break,
                },
            }
        }

        tracing::info!("Change task stopped");
    }
}
