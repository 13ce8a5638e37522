//! Delivery primitive.
//!
//! A [`Transport`] makes exactly one attempt to deliver a message body to a
//! destination. It never retries on its own: failures are classified into
//! [`DeliveryError::RateLimited`] (the server asked us to wait) and
//! [`DeliveryError::Other`], and the delivery queue decides what happens next.

mod telegram;

pub use telegram::{
    classify_response, CallbackQuery, Chat, IncomingMessage, TelegramTransport, Update,
};

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Structured-text rendering requested from the chat platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    #[serde(rename = "HTML")]
    Html,
    #[serde(rename = "MarkdownV2")]
    MarkdownV2,
}

impl ParseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseMode::Html => "HTML",
            ParseMode::MarkdownV2 => "MarkdownV2",
        }
    }
}

/// A labeled action attached below a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// Rendering options passed through to the transport untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    /// Rows of inline buttons
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Vec<InlineButton>>,
    pub disable_link_preview: bool,
}

impl RenderOptions {
    pub fn html() -> Self {
        Self {
            parse_mode: Some(ParseMode::Html),
            buttons: Vec::new(),
            disable_link_preview: true,
        }
    }

    /// Append a row holding a single button
    pub fn with_button(mut self, button: InlineButton) -> Self {
        self.buttons.push(vec![button]);
        self
    }
}

/// Outcome of a failed delivery attempt
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The server asked the caller to wait before sending again
    #[error("rate limited, retry after {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// Anything else: network failure, rejected request, malformed response
    #[error("{0}")]
    Other(String),
}

impl DeliveryError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, DeliveryError::RateLimited { .. })
    }
}

/// Delivery primitive. Implementations attempt a single network send.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Human-readable transport name
    fn name(&self) -> &str;

    /// Attempt one delivery of `body` to `destination`
    async fn send(
        &self,
        destination: &str,
        body: &str,
        options: &RenderOptions,
    ) -> Result<(), DeliveryError>;
}
