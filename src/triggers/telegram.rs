use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::queue::clamp_retry_after;
use crate::server::AppState;
use crate::transport::{DeliveryError, TelegramTransport, Update};

use super::command::{parse_callback, parse_command, Command};
use super::handler::CommandHandler;

/// Pause after a failed poll
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Extract the originating chat and the command carried by an update
pub fn route_update(update: &Update) -> Option<(i64, Command)> {
    if let Some(message) = &update.message {
        let command = parse_command(message.text.as_deref()?)?;
        return Some((message.chat.id, command));
    }

    if let Some(callback) = &update.callback_query {
        let chat_id = callback.message.as_ref()?.chat.id;
        let command = parse_callback(callback.data.as_deref()?)?;
        return Some((chat_id, command));
    }

    None
}

/// Long-polls the Bot API for commands from the configured chat
pub struct TelegramPoller {
    transport: Arc<TelegramTransport>,
    handler: CommandHandler,
    allowed_chat: String,
    poll_timeout_seconds: u64,
    shutdown: broadcast::Receiver<()>,
}

impl TelegramPoller {
    pub fn new(
        transport: Arc<TelegramTransport>,
        state: AppState,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            transport,
            allowed_chat: state.settings.telegram.chat_id.clone(),
            poll_timeout_seconds: state.settings.telegram.poll_timeout_seconds,
            handler: CommandHandler::new(state),
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let mut offset: i64 = 0;

        tracing::info!(chat_id = %self.allowed_chat, "Telegram command poller started");

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Command poller received shutdown signal");
                    break;
                }
                result = self.transport.get_updates(offset, self.poll_timeout_seconds) => {
                    match result {
                        Ok(updates) => {
                            for update in updates {
                                offset = offset.max(update.update_id + 1);
                                self.handle_update(&update).await;
                            }
                        }
                        Err(e) => {
                            let wait = match &e {
                                DeliveryError::RateLimited { retry_after } => clamp_retry_after(*retry_after),
                                DeliveryError::Other(_) => POLL_ERROR_BACKOFF,
                            };
                            tracing::warn!(
                                error = %e,
                                rate_limited = e.is_rate_limited(),
                                wait_secs = wait.as_secs(),
                                "Telegram poll failed"
                            );
                            tokio::select! {
                                _ = self.shutdown.recv() => break,
                                _ = tokio::time::sleep(wait) => {}
                            }
                        }
                    }
                }
            }
        }

        tracing::info!("Telegram command poller stopped");
    }

    async fn handle_update(&self, update: &Update) {
        let Some((chat_id, command)) = route_update(update) else {
            return;
        };

        let chat_id = chat_id.to_string();
        if chat_id != self.allowed_chat {
            tracing::debug!(
                chat_id = %chat_id,
                update_id = update.update_id,
                "Ignoring command from unauthorized chat"
            );
            return;
        }

        if let Some(callback) = &update.callback_query {
            if let Err(e) = self.transport.answer_callback_query(&callback.id).await {
                tracing::debug!(error = %e, "Failed to answer callback query");
            }
        }

        self.handler.handle(&chat_id, command).await;
    }
}
