//! The message bridge: connection supervisor and both relay flows
//!
//! [`MessageBridge::run`] loops forever: connect a broker session, subscribe
//! to the send topic, then run the device-to-broker and broker-to-device
//! flows concurrently under one `select!`. Either flow ending - by transport
//! error or fatal device error - cancels its sibling before the session
//! handles are dropped, after which the supervisor waits the configured
//! delay and reconnects. Per-message decode and encode failures are logged
//! and skipped; they never end a flow.

use crate::broker::{Broker, BrokerError, BrokerPublisher, BrokerStream};
use crate::device::{DeviceError, DeviceLink};
use crate::protocol::{BridgeTopics, SmsMessage};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Default wait between reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Errors that end one broker session. The supervisor recovers from all of
/// them by reconnecting; none are surfaced to the caller of [`MessageBridge::run`].
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Broker(#[from] BrokerError),
    #[error("device link failed: {0}")]
    Device(#[from] DeviceError),
}

/// Bidirectional relay between one modem link and an MQTT broker.
pub struct MessageBridge<B: Broker> {
    broker: B,
    topics: BridgeTopics,
    reconnect_delay: Duration,
}

impl<B: Broker> MessageBridge<B> {
    pub fn new(broker: B, topics: BridgeTopics, reconnect_delay: Duration) -> Self {
        Self {
            broker,
            topics,
            reconnect_delay,
        }
    }

    /// Run the bridge against a live modem link. Retries the broker
    /// connection forever; only cancellation by the caller ends it. The
    /// device link is borrowed and never restarted.
    pub async fn run<D: DeviceLink + ?Sized>(&self, device: &D) {
        loop {
            if let Err(error) = self.run_session(device).await {
                error!(
                    %error,
                    delay_secs = self.reconnect_delay.as_secs(),
                    "broker session ended, reconnecting"
                );
                sleep(self.reconnect_delay).await;
            }
        }
    }

    /// One supervisor iteration: connect, subscribe, relay until failure.
    async fn run_session<D: DeviceLink + ?Sized>(&self, device: &D) -> Result<(), BridgeError> {
        let (publisher, mut stream) = self.broker.connect().await?;
        publisher.subscribe(&self.topics.send).await?;
        info!(topic = %self.topics.send, "subscribed, bridge is relaying");

        // Linked cancellation: when one flow returns, select! drops the
        // other before the session handles go out of scope.
        tokio::select! {
            res = self.device_to_broker(device, &publisher) => res,
            res = self.broker_to_device(device, &mut stream) => res,
        }
    }

    /// Relay every modem message to the receive topic.
    async fn device_to_broker<D: DeviceLink + ?Sized>(
        &self,
        device: &D,
        publisher: &B::Publisher,
    ) -> Result<(), BridgeError> {
        loop {
            let message = match device.recv().await {
                Ok(message) => message,
                Err(error) if error.is_per_message() => {
                    error!(%error, "dropping undecodable modem datagram");
                    continue;
                }
                Err(error) => return Err(error.into()),
            };
            debug!(?message, "relaying modem message to broker");
            let payload = match message.to_payload() {
                Ok(payload) => payload,
                Err(error) => {
                    error!(%error, "dropping unserializable modem message");
                    continue;
                }
            };
            publisher.publish(&self.topics.receive, payload).await?;
        }
    }

    /// Relay every publication on the send topic to the modem.
    async fn broker_to_device<D: DeviceLink + ?Sized>(
        &self,
        device: &D,
        stream: &mut B::Stream,
    ) -> Result<(), BridgeError> {
        loop {
            let inbound = stream.next_message().await?;
            // Subscription should make this impossible, but guard against
            // broker delivery quirks.
            if inbound.topic != self.topics.send {
                warn!(topic = %inbound.topic, "dropping message on unexpected topic");
                continue;
            }
            let message = match SmsMessage::from_payload(&inbound.payload) {
                Ok(message) => message,
                Err(error) => {
                    error!(%error, "dropping malformed broker payload");
                    continue;
                }
            };
            debug!(?message, "relaying broker message to modem");
            match device.send(&message).await {
                Ok(()) => {}
                Err(error) if error.is_per_message() => {
                    error!(%error, "dropping message the modem link cannot encode");
                }
                Err(error) => return Err(error.into()),
            }
        }
    }
}
