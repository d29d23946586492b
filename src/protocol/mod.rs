//! Message model and topic conventions shared by both relay directions

pub mod message;
pub mod topics;

pub use message::{MessageError, SmsMessage};
pub use topics::{BridgeTopics, DEFAULT_TOPIC_PREFIX};
