//! Device collaborator: the modem side of the bridge
//!
//! The bridge talks to the modem through the [`DeviceLink`] trait so tests
//! can simulate datagram corruption and send failures without a socket. The
//! real implementation is [`UdpDeviceSession`].

use crate::protocol::SmsMessage;
use async_trait::async_trait;
use thiserror::Error;

pub mod udp;

pub use udp::UdpDeviceSession;

/// Errors from the modem link.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to decode AirLink datagram: {0}")]
    Decode(String),
    #[error("cannot encode message for the modem: {0}")]
    Encode(String),
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeviceError {
    /// Decode and encode failures affect a single message and leave the link
    /// usable; anything else is a socket-level problem.
    pub fn is_per_message(&self) -> bool {
        matches!(self, DeviceError::Decode(_) | DeviceError::Encode(_))
    }
}

/// One live modem session: an unbounded stream of inbound messages plus a
/// send operation. The bridge borrows the link for its whole run and never
/// restarts it.
#[async_trait]
pub trait DeviceLink: Send + Sync {
    /// Wait for the next inbound SMS. A decode failure is reported for the
    /// offending datagram only; the link stays usable afterwards.
    async fn recv(&self) -> Result<SmsMessage, DeviceError>;

    /// Encode and transmit one outbound SMS to the modem.
    async fn send(&self, message: &SmsMessage) -> Result<(), DeviceError>;
}
