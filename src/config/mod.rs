mod settings;

pub use settings::{
    NotifierConfig, OtelConfig, QueueConfig, RemovalMode, ServerConfig, Settings, TelegramConfig,
    WatcherConfig,
};
