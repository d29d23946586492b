//! rumqttc-backed broker implementation

use super::{Broker, BrokerError, BrokerMessage, BrokerPublisher, BrokerStream};
use crate::config::MqttConfig;
use async_trait::async_trait;
use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::{mqttbytes::QoS, AsyncClient, Event, EventLoop, MqttOptions};
use std::time::Duration;
use tracing::{debug, info};

/// Capacity of the client's outgoing request queue.
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// Broker factory configured once from [`MqttConfig`]. Each `connect` call
/// builds a fresh client and event loop.
pub struct MqttBroker {
    config: MqttConfig,
}

impl MqttBroker {
    pub fn new(config: MqttConfig) -> Self {
        Self { config }
    }

    fn options(&self) -> MqttOptions {
        // Unique client ID per connection attempt to prevent broker-side
        // session conflicts across reconnects.
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let client_id = format!("airlink2mqtt-{timestamp}");
        let mut options = MqttOptions::new(client_id, &self.config.host, self.config.port);
        options.set_keep_alive(Duration::from_secs(60));
        if let Some(username) = &self.config.username {
            let password = self.config.password.clone().unwrap_or_default();
            options.set_credentials(username, password);
        }
        options
    }
}

#[async_trait]
impl Broker for MqttBroker {
    type Publisher = MqttPublisher;
    type Stream = MqttStream;

    async fn connect(&self) -> Result<(Self::Publisher, Self::Stream), BrokerError> {
        debug!(host = %self.config.host, port = self.config.port, "connecting to MQTT broker");
        let (client, mut event_loop) = AsyncClient::new(self.options(), REQUEST_CHANNEL_CAPACITY);

        // Drive the event loop until ConnAck so an unreachable or refusing
        // broker fails this connect attempt instead of a later publish.
        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => break,
                Ok(_) => continue,
                Err(e) => return Err(BrokerError::Connection(e.to_string())),
            }
        }
        info!(host = %self.config.host, port = self.config.port, "connected to MQTT broker");

        Ok((MqttPublisher { client }, MqttStream { event_loop }))
    }
}

/// Cloneable publish/subscribe handle backed by the rumqttc request queue.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

#[async_trait]
impl BrokerPublisher for MqttPublisher {
    async fn subscribe(&self, topic: &str) -> Result<(), BrokerError> {
        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| BrokerError::Subscribe(e.to_string()))
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))
    }
}

/// Inbound message stream. Polling the event loop here also drives keep
/// alives and publish acknowledgements for the whole session.
pub struct MqttStream {
    event_loop: EventLoop,
}

#[async_trait]
impl BrokerStream for MqttStream {
    async fn next_message(&mut self) -> Result<BrokerMessage, BrokerError> {
        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Ok(BrokerMessage {
                        topic: String::from_utf8_lossy(&publish.topic).to_string(),
                        payload: publish.payload,
                    });
                }
                Ok(Event::Incoming(Packet::Disconnect(disconnect))) => {
                    return Err(BrokerError::Connection(format!(
                        "broker sent disconnect: {:?}",
                        disconnect.reason_code
                    )));
                }
                // Acks, pings and subacks keep the session alive but carry
                // no messages.
                Ok(_) => continue,
                Err(e) => return Err(BrokerError::Connection(e.to_string())),
            }
        }
    }
}
