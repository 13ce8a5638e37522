use crate::addresses::RemovalOutcome;
use crate::error::Result;
use crate::metrics::CommandMetrics;
use crate::notification::escape_html;
use crate::queue::PendingMessage;
use crate::server::AppState;
use crate::transport::RenderOptions;

use super::command::Command;

/// Executes chat commands against the shared context.
///
/// Replies go through the delivery queue like every other outbound message.
#[derive(Clone)]
pub struct CommandHandler {
    state: AppState,
}

impl CommandHandler {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub async fn handle(&self, chat_id: &str, command: Command) {
        tracing::debug!(chat_id = %chat_id, command = ?command, "Handling command");

        let reply = match command {
            Command::Start | Command::Help => self.info_text().await,
            Command::Status => self.status_text(),
            Command::Remove(None) => "Usage: <code>/remove &lt;address&gt;</code>".to_string(),
            Command::Remove(Some(address)) => self.remove_reply(&address).await,
            Command::Unknown(name) => format!(
                "Unknown command <code>/{}</code>. Try /help",
                escape_html(&name)
            ),
        };

        self.state
            .queue
            .enqueue(PendingMessage::new(chat_id, reply, RenderOptions::html()));
    }

    /// Remove an address from the list file, the known set and the
    /// notified-set. An absent address changes nothing.
    pub async fn remove_address(&self, address: &str) -> Result<RemovalOutcome> {
        let mut book = self.state.book.lock().await;

        let outcome = match self.state.address_file.remove(address).await {
            Ok(outcome) => outcome,
            Err(e) => {
                CommandMetrics::record_removal("failed");
                return Err(e);
            }
        };

        if outcome == RemovalOutcome::Removed {
            if let Err(e) = book.forget(address).await {
                tracing::warn!(
                    address = %address,
                    error = %e,
                    "Removed address but failed to persist notified-set"
                );
            }
        }

        CommandMetrics::record_removal(outcome.as_str());
        Ok(outcome)
    }

    async fn remove_reply(&self, address: &str) -> String {
        let escaped = escape_html(address);
        match self.remove_address(address).await {
            Ok(RemovalOutcome::Removed) => format!("Removed <code>{}</code>", escaped),
            Ok(RemovalOutcome::NotFound) => format!("Address not found: <code>{}</code>", escaped),
            Err(e) => {
                tracing::error!(address = %address, error = %e, "Failed to remove address");
                format!(
                    "Failed to remove <code>{}</code>: {}",
                    escaped,
                    escape_html(&e.to_string())
                )
            }
        }
    }

    async fn info_text(&self) -> String {
        let (known, notified) = {
            let book = self.state.book.lock().await;
            (book.known_len(), book.notified().len())
        };
        let settings = &self.state.settings;

        format!(
            "<b>Wallet relay</b>\n\
             Watching <code>{}</code>\n\
             Known addresses: {}\n\
             Already notified: {}\n\
             Queued messages: {}\n\
             Removal: {}\n\n\
             Commands: /remove &lt;address&gt;, /status, /help",
            escape_html(&self.state.address_file.path().display().to_string()),
            known,
            notified,
            self.state.queue.len(),
            settings.notifier.removal_mode.as_str(),
        )
    }

    fn status_text(&self) -> String {
        let stats = self.state.queue.stats();
        format!(
            "<b>Delivery queue</b>\n\
             Pending: {}\n\
             Delivered: {}\n\
             Rate limited: {}\n\
             Abandoned: {}\n\
             Backoff remaining: {}s",
            stats.depth,
            stats.delivered,
            stats.rate_limited,
            stats.abandoned,
            stats.backoff_remaining_ms.div_ceil(1000),
        )
    }
}
