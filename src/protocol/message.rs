//! SMS message model and its flat JSON representation
//!
//! A message crosses the bridge in two shapes: the structured [`SmsMessage`]
//! used by the device and bridge code, and a flat key-value JSON object used
//! as the MQTT wire payload. The structured-to-flat direction is total; the
//! flat-to-structured direction parses untrusted broker input and can fail
//! with a typed [`MessageError`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// One SMS-like message relayed between the modem and the broker.
///
/// Absent fields are omitted from the JSON form so the payload field set is
/// preserved exactly across the bridge: an inbound modem message carries
/// `sender` and `body`, an outbound broker message carries `recipient` and
/// `body`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmsMessage {
    /// Phone number the message originated from (inbound messages).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Phone number the message is addressed to (outbound messages).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    /// Message text.
    pub body: String,
}

/// Errors produced while converting the flat wire form back into a
/// structured message.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("malformed message JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl SmsMessage {
    /// Message received from the modem.
    pub fn inbound(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: Some(sender.into()),
            recipient: None,
            body: body.into(),
        }
    }

    /// Message addressed to the modem.
    pub fn outbound(recipient: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: None,
            recipient: Some(recipient.into()),
            body: body.into(),
        }
    }

    /// Flat key-value form. Total: every structured message has one.
    pub fn to_flat(&self) -> Map<String, Value> {
        let mut flat = Map::new();
        if let Some(sender) = &self.sender {
            flat.insert("sender".to_string(), Value::String(sender.clone()));
        }
        if let Some(recipient) = &self.recipient {
            flat.insert("recipient".to_string(), Value::String(recipient.clone()));
        }
        flat.insert("body".to_string(), Value::String(self.body.clone()));
        flat
    }

    /// Rebuild a structured message from its flat form.
    pub fn from_flat(flat: Map<String, Value>) -> Result<Self, MessageError> {
        Ok(serde_json::from_value(Value::Object(flat))?)
    }

    /// Serialize to the UTF-8 JSON wire payload.
    pub fn to_payload(&self) -> Result<Vec<u8>, MessageError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse an MQTT wire payload into a structured message.
    pub fn from_payload(payload: &[u8]) -> Result<Self, MessageError> {
        let text = std::str::from_utf8(payload)?;
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(MessageError::NotAnObject);
        }
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_inbound_payload_shape() {
        let message = SmsMessage::inbound("+15551234567", "hi");
        let payload = message.to_payload().unwrap();
        assert_eq!(
            String::from_utf8(payload).unwrap(),
            r#"{"sender":"+15551234567","body":"hi"}"#
        );
    }

    #[test]
    fn test_outbound_payload_parses_to_structured() {
        let payload = br#"{"recipient":"+15551234567","body":"reply"}"#;
        let message = SmsMessage::from_payload(payload).unwrap();
        assert_eq!(message, SmsMessage::outbound("+15551234567", "reply"));
    }

    #[test]
    fn test_from_payload_rejects_invalid_json() {
        let result = SmsMessage::from_payload(b"{not json");
        assert!(matches!(result, Err(MessageError::Json(_))));
    }

    #[test]
    fn test_from_payload_rejects_non_object() {
        let result = SmsMessage::from_payload(b"[1, 2, 3]");
        assert!(matches!(result, Err(MessageError::NotAnObject)));
    }

    #[test]
    fn test_from_payload_rejects_invalid_utf8() {
        let result = SmsMessage::from_payload(&[0xff, 0xfe, 0x7b]);
        assert!(matches!(result, Err(MessageError::InvalidUtf8(_))));
    }

    #[test]
    fn test_from_payload_rejects_unknown_fields() {
        let result = SmsMessage::from_payload(br#"{"body":"x","extra":1}"#);
        assert!(matches!(result, Err(MessageError::Json(_))));
    }

    #[test]
    fn test_from_payload_requires_body() {
        let result = SmsMessage::from_payload(br#"{"recipient":"+15551234567"}"#);
        assert!(matches!(result, Err(MessageError::Json(_))));
    }

    #[test]
    fn test_flat_round_trip() {
        let message = SmsMessage::inbound("+15551234567", "hello");
        let rebuilt = SmsMessage::from_flat(message.to_flat()).unwrap();
        assert_eq!(message, rebuilt);
    }

    proptest! {
        #[test]
        fn flat_round_trip_is_lossless(
            sender in proptest::option::of("[+0-9]{1,15}"),
            recipient in proptest::option::of("[+0-9]{1,15}"),
            body in ".*",
        ) {
            // Property: structured -> flat -> JSON -> parse -> structured
            // either reproduces the message exactly or fails with a typed
            // error. It must never silently change the content.
            let message = SmsMessage { sender, recipient, body };
            let payload = message.to_payload().unwrap();
            match SmsMessage::from_payload(&payload) {
                Ok(rebuilt) => prop_assert_eq!(message, rebuilt),
                Err(MessageError::InvalidUtf8(_))
                | Err(MessageError::NotAnObject)
                | Err(MessageError::Json(_)) => {}
            }
        }
    }
}
