use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

/// Collapses bursts of raw file events into single change signals.
///
/// One timer, re-armed on every raw event; a signal is emitted once the
/// file has been quiet for the whole period.
#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    quiet: Duration,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self { quiet }
    }

    /// Run until shutdown or until the raw event source goes away.
    ///
    /// Signals are coalesced when the consumer is still busy with the
    /// previous one.
    pub async fn run(
        self,
        mut raw: mpsc::UnboundedReceiver<()>,
        changes: mpsc::Sender<()>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let timer = tokio::time::sleep(self.quiet);
        tokio::pin!(timer);
        let mut armed = false;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::debug!("Debouncer received shutdown signal");
                    break;
                }
                event = raw.recv() => match event {
                    Some(()) => {
                        timer.as_mut().reset(Instant::now() + self.quiet);
                        armed = true;
                    }
                    None => break,
                },
                _ = &mut timer, if armed => {
                    armed = false;
                    match changes.try_send(()) {
                        Ok(()) | Err(mpsc::error::TrySendError::Full(())) => {}
                        Err(mpsc::error::TrySendError::Closed(())) => break,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Harness {
        raw: mpsc::UnboundedSender<()>,
        changes: mpsc::Receiver<()>,
        shutdown: broadcast::Sender<()>,
        handle: tokio::task::JoinHandle<()>,
    }

    fn spawn(quiet_ms: u64) -> Harness {
        let (raw, raw_rx) = mpsc::unbounded_channel();
        let (changes_tx, changes) = mpsc::channel(1);
        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(
            Debouncer::new(Duration::from_millis(quiet_ms)).run(raw_rx, changes_tx, shutdown_rx),
        );
        Harness {
            raw,
            changes,
            shutdown,
            handle,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_yields_one_signal() {
        let mut h = spawn(1000);

        for _ in 0..5 {
            h.raw.send(()).unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        }

        // Quiet period restarts with each event
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(h.changes.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(h.changes.try_recv().is_ok());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(h.changes.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_yield_separate_signals() {
        let mut h = spawn(1000);

        h.raw.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(h.changes.try_recv().is_ok());

        h.raw.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(h.changes.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_signal_without_events() {
        let mut h = spawn(1000);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(h.changes.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_shutdown() {
        let h = spawn(1000);

        h.shutdown.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(1), h.handle)
            .await
            .expect("debouncer should stop")
            .unwrap();
    }
}
