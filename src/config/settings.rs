use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token
    #[serde(default)]
    pub bot_token: String,
    /// Chat that receives notifications and is allowed to issue commands
    #[serde(default)]
    pub chat_id: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Long-poll timeout for getUpdates in seconds
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatcherConfig {
    #[serde(default = "default_address_file")]
    pub address_file: PathBuf,
    /// Quiet period before a burst of file events becomes one change signal
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

/// How the "remove this address" action is offered to the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemovalMode {
    /// Text hint pointing at the `/remove` command
    Command,
    /// Inline button attached to each new-address message
    #[default]
    Button,
}

impl RemovalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalMode::Command => "command",
            RemovalMode::Button => "button",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    /// More new addresses than this in one change produce a single summary
    #[serde(default = "default_summary_threshold")]
    pub summary_threshold: usize,
    /// Addresses listed verbatim in a summary message
    #[serde(default = "default_summary_preview")]
    pub summary_preview: usize,
    #[serde(default = "default_notified_file")]
    pub notified_file: PathBuf,
    #[serde(default = "default_true")]
    pub persist_notified: bool,
    #[serde(default)]
    pub removal_mode: RemovalMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Minimum spacing between two sends in milliseconds
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    /// Abandoned messages kept for inspection
    #[serde(default = "default_dead_letter_capacity")]
    pub dead_letter_capacity: usize,
    /// How long shutdown waits for pending messages
    #[serde(default = "default_drain_timeout_seconds")]
    pub drain_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_address_file() -> PathBuf {
    PathBuf::from("addresses.txt")
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_summary_threshold() -> usize {
    50
}

fn default_summary_preview() -> usize {
    10
}

fn default_notified_file() -> PathBuf {
    PathBuf::from("notified.json")
}

fn default_true() -> bool {
    true
}

fn default_min_interval_ms() -> u64 {
    1000
}

fn default_drain_timeout_seconds() -> u64 {
    10
}

fn default_dead_letter_capacity() -> usize {
    100
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "wallet-relay".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(Self::environment())
            .build()?;

        Self::from_config(config)
    }

    /// Environment source. Sections nest with a double underscore because
    /// field names contain single ones: `TELEGRAM__BOT_TOKEN`,
    /// `TELEGRAM__CHAT_ID`, `WATCHER__ADDRESS_FILE`, `QUEUE__MIN_INTERVAL_MS`.
    pub fn environment() -> Environment {
        Environment::default().separator("__").try_parsing(true)
    }

    /// Deserialize and validate an already-assembled configuration.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject configurations the relay cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(ConfigError::Message(
                "telegram.bot_token is required (TELEGRAM__BOT_TOKEN)".to_string(),
            ));
        }
        if self.telegram.chat_id.trim().is_empty() {
            return Err(ConfigError::Message(
                "telegram.chat_id is required (TELEGRAM__CHAT_ID)".to_string(),
            ));
        }
        if self.notifier.summary_preview == 0 {
            return Err(ConfigError::Message(
                "notifier.summary_preview must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl WatcherConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl QueueConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_seconds)
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            address_file: default_address_file(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            summary_threshold: default_summary_threshold(),
            summary_preview: default_summary_preview(),
            notified_file: default_notified_file(),
            persist_notified: true,
            removal_mode: RemovalMode::default(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            dead_letter_capacity: default_dead_letter_capacity(),
            drain_timeout_seconds: default_drain_timeout_seconds(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}
