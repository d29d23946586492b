//! airlink2mqtt - AirLink SMS to MQTT bridge
//!
//! Bridges a Sierra Wireless AirLink modem's SMS-over-UDP datagram protocol
//! with an MQTT broker. Inbound modem messages are published to
//! `<prefix>/message/receive` as flat JSON objects; publications on
//! `<prefix>/message/send` are decoded and transmitted to the modem.
//!
//! The core is [`bridge::MessageBridge`]: a retry-forever connection
//! supervisor running both relay directions concurrently with linked
//! cancellation. The modem and the broker sit behind the [`device::DeviceLink`]
//! and [`broker::Broker`] traits so either side can be replaced by the mocks
//! in [`testing`].
//!
//! # Example
//!
//! ```no_run
//! use airlink2mqtt::bridge::MessageBridge;
//! use airlink2mqtt::broker::MqttBroker;
//! use airlink2mqtt::config::{DeviceConfig, MqttConfig};
//! use airlink2mqtt::device::UdpDeviceSession;
//! use airlink2mqtt::protocol::BridgeTopics;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mqtt = MqttConfig {
//!     host: "localhost".to_string(),
//!     port: 1883,
//!     username: None,
//!     password: None,
//!     topic_prefix: "home/modem".to_string(),
//!     reconnect_delay: Duration::from_secs(5),
//! };
//! let device = UdpDeviceSession::bind(&DeviceConfig {
//!     host: "192.168.13.31".to_string(),
//!     port: 17341,
//!     listen_port: 17341,
//!     bind_addr: "0.0.0.0".to_string(),
//! })
//! .await?;
//!
//! let topics = BridgeTopics::new(&mqtt.topic_prefix);
//! let reconnect_delay = mqtt.reconnect_delay;
//! let bridge = MessageBridge::new(MqttBroker::new(mqtt), topics, reconnect_delay);
//! bridge.run(&device).await;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod broker;
pub mod config;
pub mod device;
pub mod observability;
pub mod protocol;
pub mod testing;

pub use bridge::{BridgeError, MessageBridge};
pub use broker::MqttBroker;
pub use config::{Cli, Settings};
pub use device::{DeviceLink, UdpDeviceSession};
pub use protocol::{BridgeTopics, MessageError, SmsMessage};
