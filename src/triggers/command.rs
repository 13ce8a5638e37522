//! Parsing of chat commands and inline button payloads.

use crate::notification::REMOVE_CALLBACK_PREFIX;

/// A request from the chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/start`: what is being watched
    Start,
    Help,
    /// `/status`: delivery queue state
    Status,
    /// `/remove <address>`; `None` when the argument is missing
    Remove(Option<String>),
    Unknown(String),
}

/// Parse a text message. Returns `None` for anything that is not a command.
///
/// Accepts the `/name@botname` form used in group chats.
pub fn parse_command(text: &str) -> Option<Command> {
    let rest = text.trim().strip_prefix('/')?;
    let mut parts = rest.split_whitespace();
    let head = parts.next()?;
    let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();
    let argument = parts.next().map(str::to_string);

    let command = match name.as_str() {
        "start" => Command::Start,
        "help" => Command::Help,
        "status" => Command::Status,
        "remove" | "rm" => Command::Remove(argument),
        _ => Command::Unknown(name),
    };
    Some(command)
}

/// Parse the payload of an inline button press
pub fn parse_callback(data: &str) -> Option<Command> {
    data.strip_prefix(REMOVE_CALLBACK_PREFIX)
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(|address| Command::Remove(Some(address.to_string())))
}
