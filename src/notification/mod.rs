//! New-address notifications: diffing the address list and shaping the
//! messages handed to the delivery queue.

mod producer;
pub mod render;

pub use producer::{ChangeOutcome, NotificationProducer};
pub use render::{escape_html, MessageRenderer, REMOVE_CALLBACK_PREFIX};
