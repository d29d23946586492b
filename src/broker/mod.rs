//! Broker collaborator: the MQTT side of the bridge
//!
//! The bridge creates one broker session per reconnect-loop iteration
//! through the [`Broker`] trait. A session splits into a cloneable
//! [`BrokerPublisher`] handle and an exclusive [`BrokerStream`] so the two
//! relay flows can use it concurrently. Any transport failure surfaces as a
//! [`BrokerError`], which ends the session.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub mod mqtt;

pub use mqtt::MqttBroker;

/// Connection-level broker errors. All of these are fatal to the current
/// session and recovered by a full reconnect.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker connection failed: {0}")]
    Connection(String),
    #[error("subscription failed: {0}")]
    Subscribe(String),
    #[error("publish failed: {0}")]
    Publish(String),
}

/// One inbound broker publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub topic: String,
    pub payload: Bytes,
}

/// Factory for broker sessions. `connect` is called once per supervisor
/// iteration; dropping both halves of the returned pair releases the
/// connection.
#[async_trait]
pub trait Broker: Send + Sync {
    type Publisher: BrokerPublisher + Clone + Send + Sync + 'static;
    type Stream: BrokerStream + Send;

    async fn connect(&self) -> Result<(Self::Publisher, Self::Stream), BrokerError>;
}

/// Outbound half of a session.
#[async_trait]
pub trait BrokerPublisher: Send + Sync {
    async fn subscribe(&self, topic: &str) -> Result<(), BrokerError>;
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BrokerError>;
}

/// Inbound half of a session. Valid only while connected; a transport
/// failure ends the stream with an error.
#[async_trait]
pub trait BrokerStream: Send {
    async fn next_message(&mut self) -> Result<BrokerMessage, BrokerError>;
}
