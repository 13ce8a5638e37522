//! Message text and markup for the chat.

use crate::config::{NotifierConfig, RemovalMode};
use crate::transport::{InlineButton, RenderOptions};

/// Callback payload prefix of the inline "Remove" button
pub const REMOVE_CALLBACK_PREFIX: &str = "rm:";

/// Telegram rejects callback data longer than this many bytes
const CALLBACK_DATA_LIMIT: usize = 64;

/// Escape text for Telegram's HTML parse mode
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Callback data for removing `address`, if it fits the platform limit
pub fn remove_callback_data(address: &str) -> Option<String> {
    let data = format!("{}{}", REMOVE_CALLBACK_PREFIX, address);
    (data.len() <= CALLBACK_DATA_LIMIT).then_some(data)
}

/// Renders new-address notifications
#[derive(Debug, Clone)]
pub struct MessageRenderer {
    removal_mode: RemovalMode,
    summary_preview: usize,
}

impl MessageRenderer {
    pub fn new(config: &NotifierConfig) -> Self {
        Self {
            removal_mode: config.removal_mode,
            summary_preview: config.summary_preview,
        }
    }

    /// One message announcing a single address
    pub fn new_address(&self, address: &str) -> (String, RenderOptions) {
        let mut body = format!(
            "<b>New wallet address</b>\n<code>{}</code>",
            escape_html(address)
        );
        let mut options = RenderOptions::html();

        let button = match self.removal_mode {
            RemovalMode::Button => remove_callback_data(address),
            RemovalMode::Command => None,
        };

        match button {
            Some(data) => options = options.with_button(InlineButton::new("Remove", data)),
            None => body.push_str(&format!(
                "\n\nRemove with: <code>/remove {}</code>",
                escape_html(address)
            )),
        }

        (body, options)
    }

    /// One message covering a large batch: the first addresses verbatim,
    /// the rest counted.
    pub fn summary(&self, addresses: &[String]) -> (String, RenderOptions) {
        let mut body = format!("<b>{} new wallet addresses</b>", addresses.len());

        for address in addresses.iter().take(self.summary_preview) {
            body.push_str(&format!("\n<code>{}</code>", escape_html(address)));
        }

        let remaining = addresses.len().saturating_sub(self.summary_preview);
        if remaining > 0 {
            body.push_str(&format!("\n... and {} more", remaining));
        }

        (body, RenderOptions::html())
    }
}
