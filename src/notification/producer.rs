use std::sync::Arc;

use tokio::sync::Mutex;

use crate::addresses::{AddressBook, AddressFile};
use crate::config::NotifierConfig;
use crate::metrics::ProducerMetrics;
use crate::queue::{DeliveryQueue, PendingMessage};
use crate::server::AppState;

use super::render::MessageRenderer;

/// What one change signal produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeOutcome {
    /// Entries currently in the address file
    pub current: usize,
    pub new_addresses: usize,
    pub messages: usize,
    pub summarized: bool,
}

/// Turns address file changes into queued notifications
pub struct NotificationProducer {
    config: NotifierConfig,
    destination: String,
    renderer: MessageRenderer,
    address_file: Arc<AddressFile>,
    book: Arc<Mutex<AddressBook>>,
    queue: Arc<DeliveryQueue>,
}

impl NotificationProducer {
    pub fn new(
        config: NotifierConfig,
        destination: impl Into<String>,
        address_file: Arc<AddressFile>,
        book: Arc<Mutex<AddressBook>>,
        queue: Arc<DeliveryQueue>,
    ) -> Self {
        Self {
            renderer: MessageRenderer::new(&config),
            config,
            destination: destination.into(),
            address_file,
            book,
            queue,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.settings.notifier.clone(),
            state.destination(),
            state.address_file.clone(),
            state.book.clone(),
            state.queue.clone(),
        )
    }

    /// Individual messages, or a single summary once the batch is larger
    /// than the threshold.
    pub fn shape_messages(&self, new_addresses: &[String]) -> Vec<PendingMessage> {
        if new_addresses.is_empty() {
            return Vec::new();
        }

        if new_addresses.len() > self.config.summary_threshold {
            let (body, options) = self.renderer.summary(new_addresses);
            return vec![PendingMessage::new(&self.destination, body, options)];
        }

        new_addresses
            .iter()
            .map(|address| {
                let (body, options) = self.renderer.new_address(address);
                PendingMessage::new(&self.destination, body, options)
            })
            .collect()
    }

    /// Handle one debounced change of the address file.
    ///
    /// A read failure leaves all state untouched until the next signal. The
    /// book stays locked from the read through the diff so a concurrent
    /// removal is either fully before or fully after this scan.
    #[tracing::instrument(name = "address_change", skip(self))]
    pub async fn on_change(&self) -> ChangeOutcome {
        ProducerMetrics::record_change();

        let mut book = self.book.lock().await;
        let current = match self.address_file.load().await {
            Ok(current) => current,
            Err(e) => {
                tracing::warn!(
                    path = %self.address_file.path().display(),
                    error = %e,
                    "Failed to read address file, skipping change"
                );
                return ChangeOutcome::default();
            }
        };

        let new_addresses = book.new_addresses(&current);
        let messages = self.shape_messages(&new_addresses);
        let outcome = ChangeOutcome {
            current: current.len(),
            new_addresses: new_addresses.len(),
            messages: messages.len(),
            summarized: new_addresses.len() > self.config.summary_threshold,
        };

        for message in messages {
            self.queue.enqueue(message);
        }

        book.replace_known(current);

        if !new_addresses.is_empty() {
            if let Err(e) = book.record_notified(&new_addresses).await {
                tracing::error!(error = %e, "Failed to persist notified-set");
            }
            ProducerMetrics::record_notified(new_addresses.len(), outcome.summarized);
        }

        tracing::info!(
            current = outcome.current,
            new_addresses = outcome.new_addresses,
            messages = outcome.messages,
            summarized = outcome.summarized,
            "Processed address file change"
        );

        outcome
    }
}
