//! Inbound command surface: chat commands and inline button presses.

mod command;
mod handler;
mod telegram;

pub use command::{parse_callback, parse_command, Command};
pub use handler::CommandHandler;
pub use telegram::{route_update, TelegramPoller};
