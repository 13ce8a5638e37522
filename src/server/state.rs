use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::addresses::{AddressBook, AddressFile};
use crate::config::Settings;
use crate::queue::DeliveryQueue;
use crate::transport::Transport;

/// Single owning context shared by every task and handler
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub queue: Arc<DeliveryQueue>,
    pub address_file: Arc<AddressFile>,
    pub book: Arc<Mutex<AddressBook>>,
    pub start_time: Instant,
}

impl AppState {
    /// Build the context, loading the notified-set and the address baseline.
    pub async fn initialize(settings: Settings, transport: Arc<dyn Transport>) -> Self {
        let queue = Arc::new(DeliveryQueue::new(transport, settings.queue.clone()));
        let address_file = Arc::new(AddressFile::new(settings.watcher.address_file.clone()));
        let book = AddressBook::initialize(&address_file, &settings.notifier).await;

        Self {
            settings: Arc::new(settings),
            queue,
            address_file,
            book: Arc::new(Mutex::new(book)),
            start_time: Instant::now(),
        }
    }

    /// Chat receiving notifications
    pub fn destination(&self) -> &str {
        &self.settings.telegram.chat_id
    }
}
