use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::TelegramConfig;

use super::{DeliveryError, RenderOptions, Transport};

/// Retry-after assumed when the server answers 429 without saying how long to wait
const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// Extra slack on top of the long-poll timeout before the HTTP request gives up
const POLL_REQUEST_SLACK_SECS: u64 = 10;

/// Envelope of every Bot API response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

/// One entry of a getUpdates result
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Press of an inline button
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

/// Turn a Bot API response into a typed result or a classified delivery error.
fn parse_api_response<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, DeliveryError> {
    let parsed: Option<ApiResponse<T>> = serde_json::from_str(body).ok();

    let retry_after = parsed
        .as_ref()
        .and_then(|r| r.parameters.as_ref())
        .and_then(|p| p.retry_after);
    if let Some(secs) = retry_after {
        return Err(DeliveryError::RateLimited {
            retry_after: Duration::from_secs(secs),
        });
    }
    if status == 429 {
        return Err(DeliveryError::RateLimited {
            retry_after: Duration::from_secs(DEFAULT_RETRY_AFTER_SECS),
        });
    }

    match parsed {
        Some(response) if response.ok && (200..300).contains(&status) => response
            .result
            .ok_or_else(|| DeliveryError::Other("response carried no result".to_string())),
        Some(response) => Err(DeliveryError::Other(format!(
            "telegram error {}: {}",
            response.error_code.unwrap_or(i64::from(status)),
            response
                .description
                .unwrap_or_else(|| "unknown error".to_string())
        ))),
        None => Err(DeliveryError::Other(format!(
            "unexpected response (status {})",
            status
        ))),
    }
}

/// Classify a sendMessage response.
pub fn classify_response(status: u16, body: &str) -> Result<(), DeliveryError> {
    parse_api_response::<serde_json::Value>(status, body).map(|_| ())
}

/// Telegram Bot API client used both as the delivery primitive and as the
/// source of inbound updates.
pub struct TelegramTransport {
    bot_token: String,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramTransport {
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            bot_token: config.bot_token.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    /// Build the JSON body of a sendMessage call.
    pub fn build_send_body(
        destination: &str,
        body: &str,
        options: &RenderOptions,
    ) -> serde_json::Value {
        let mut payload = serde_json::json!({
            "chat_id": destination,
            "text": body,
        });

        if let Some(mode) = options.parse_mode {
            payload["parse_mode"] = serde_json::Value::String(mode.as_str().to_string());
        }
        if options.disable_link_preview {
            payload["link_preview_options"] = serde_json::json!({ "is_disabled": true });
        }
        if !options.buttons.is_empty() {
            payload["reply_markup"] = serde_json::json!({ "inline_keyboard": options.buttons });
        }

        payload
    }

    async fn post<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<T, DeliveryError> {
        let mut request = self.client.post(self.api_url(method)).json(payload);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        // Strip the URL from transport errors: it embeds the bot token
        let response = request
            .send()
            .await
            .map_err(|e| DeliveryError::Other(e.without_url().to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| DeliveryError::Other(e.without_url().to_string()))?;

        parse_api_response(status, &text)
    }

    /// Long-poll for inbound messages and button presses.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, DeliveryError> {
        let payload = serde_json::json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });

        self.post(
            "getUpdates",
            &payload,
            Some(Duration::from_secs(timeout_secs + POLL_REQUEST_SLACK_SECS)),
        )
        .await
    }

    /// Dismiss the loading indicator on a pressed inline button.
    pub async fn answer_callback_query(&self, callback_id: &str) -> Result<(), DeliveryError> {
        let payload = serde_json::json!({ "callback_query_id": callback_id });
        self.post::<serde_json::Value>("answerCallbackQuery", &payload, None)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(
        &self,
        destination: &str,
        body: &str,
        options: &RenderOptions,
    ) -> Result<(), DeliveryError> {
        let payload = Self::build_send_body(destination, body, options);
        self.post::<serde_json::Value>("sendMessage", &payload, None)
            .await
            .map(|_| ())
    }
}
