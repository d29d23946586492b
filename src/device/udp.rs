//! UDP session speaking the AirLink ASCII SMS datagram format
//!
//! AirLink modems exchange SMS over UDP as framed ASCII datagrams:
//!
//! ```text
//! <<<phone-number,ASCII,message body>>>
//! ```
//!
//! The same frame is used in both directions. Inbound frames that do not
//! match the format yield [`DeviceError::Decode`] for that datagram only.

use super::{DeviceError, DeviceLink};
use crate::config::DeviceConfig;
use crate::protocol::SmsMessage;
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use tokio::net::{lookup_host, UdpSocket};
use tracing::debug;

const FRAME_START: &str = "<<<";
const FRAME_END: &str = ">>>";
const ENCODING_ASCII: &str = "ASCII";

/// Largest datagram the modem is expected to send. SMS bodies are short;
/// this leaves generous headroom for concatenated messages.
const MAX_DATAGRAM: usize = 2048;

/// A bound UDP socket paired with the modem's address.
pub struct UdpDeviceSession {
    socket: UdpSocket,
    remote: SocketAddr,
}

impl UdpDeviceSession {
    /// Bind the local listen port and resolve the modem address.
    pub async fn bind(config: &DeviceConfig) -> Result<Self, DeviceError> {
        let socket = UdpSocket::bind((config.bind_addr.as_str(), config.listen_port)).await?;
        let remote = lookup_host((config.host.as_str(), config.port))
            .await?
            .next()
            .ok_or_else(|| {
                DeviceError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no address found for modem host {}", config.host),
                ))
            })?;
        debug!(%remote, listen_port = config.listen_port, "bound AirLink UDP socket");
        Ok(Self { socket, remote })
    }
}

#[async_trait]
impl DeviceLink for UdpDeviceSession {
    async fn recv(&self) -> Result<SmsMessage, DeviceError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let (len, peer) = self.socket.recv_from(&mut buf).await?;
        debug!(%peer, len, "received AirLink datagram");
        decode_datagram(&buf[..len])
    }

    async fn send(&self, message: &SmsMessage) -> Result<(), DeviceError> {
        let datagram = encode_datagram(message)?;
        self.socket.send_to(&datagram, self.remote).await?;
        debug!(remote = %self.remote, len = datagram.len(), "sent AirLink datagram");
        Ok(())
    }
}

fn decode_datagram(datagram: &[u8]) -> Result<SmsMessage, DeviceError> {
    let text = std::str::from_utf8(datagram)
        .map_err(|e| DeviceError::Decode(format!("datagram is not valid UTF-8: {e}")))?;
    let text = text.trim_end_matches(['\r', '\n']);
    let inner = text
        .strip_prefix(FRAME_START)
        .and_then(|t| t.strip_suffix(FRAME_END))
        .ok_or_else(|| DeviceError::Decode(format!("missing frame markers in {text:?}")))?;

    let mut parts = inner.splitn(3, ',');
    let sender = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DeviceError::Decode("empty sender field".to_string()))?;
    let encoding = parts
        .next()
        .ok_or_else(|| DeviceError::Decode("missing encoding field".to_string()))?;
    let body = parts
        .next()
        .ok_or_else(|| DeviceError::Decode("missing message body".to_string()))?;

    if encoding != ENCODING_ASCII {
        return Err(DeviceError::Decode(format!(
            "unsupported encoding: {encoding}"
        )));
    }

    Ok(SmsMessage::inbound(sender, body))
}

fn encode_datagram(message: &SmsMessage) -> Result<Vec<u8>, DeviceError> {
    let recipient = message
        .recipient
        .as_deref()
        .ok_or_else(|| DeviceError::Encode("outbound message has no recipient".to_string()))?;
    if !recipient.is_ascii() || recipient.contains(',') {
        return Err(DeviceError::Encode(format!(
            "recipient is not a valid phone number: {recipient:?}"
        )));
    }
    if !message.body.is_ascii() {
        return Err(DeviceError::Encode(
            "message body contains non-ASCII characters".to_string(),
        ));
    }
    Ok(format!("{FRAME_START}{recipient},{ENCODING_ASCII},{}{FRAME_END}", message.body).into_bytes())
}
