//! The tick record broadcast between peers.

use serde::{Deserialize, Serialize};

use crate::WireError;

/// A tick broadcast by a peer.
///
/// Serialized as a JSON object so that the field names travel with the
/// data. The wire identifiers (`Message`, `SenderID`, `SenderPeerName`) are
/// the ones already in use by deployed peers; the lower-camel spellings are
/// accepted on decode. Unknown fields are ignored and missing fields decode
/// as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickMessage {
    /// Free-form content, `"tick"` for ordinary pulses.
    #[serde(rename = "Message", alias = "content")]
    pub content: String,
    /// Displayed [`PeerId`](crate::PeerId) of the sender.
    #[serde(rename = "SenderID", alias = "senderID")]
    pub sender_id: String,
    /// Human-readable name of the sender.
    #[serde(rename = "SenderPeerName", alias = "senderPeerName")]
    pub sender_peer_name: String,
}

impl TickMessage {
    /// Create a new tick message.
    pub fn new(
        content: impl Into<String>,
        sender_id: impl Into<String>,
        sender_peer_name: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            sender_id: sender_id.into(),
            sender_peer_name: sender_peer_name.into(),
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(self).map_err(WireError::Encode)
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        serde_json::from_slice(bytes).map_err(WireError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_with_wire_field_names() {
        let msg = TickMessage::new("tick", "abc", "alice");
        let value: serde_json::Value = serde_json::from_slice(&msg.to_bytes().unwrap()).unwrap();

        assert_eq!(value["Message"], "tick");
        assert_eq!(value["SenderID"], "abc");
        assert_eq!(value["SenderPeerName"], "alice");
    }

    #[test]
    fn decodes_record_from_existing_peer() {
        let bytes = br#"{"Message":"tick","SenderID":"Qm123","SenderPeerName":"bob-12345678"}"#;
        let msg = TickMessage::from_bytes(bytes).unwrap();

        assert_eq!(msg, TickMessage::new("tick", "Qm123", "bob-12345678"));
    }

    #[test]
    fn accepts_lower_camel_aliases() {
        let bytes = br#"{"content":"tick","senderID":"x","senderPeerName":"y"}"#;
        let msg = TickMessage::from_bytes(bytes).unwrap();

        assert_eq!(msg.content, "tick");
        assert_eq!(msg.sender_id, "x");
        assert_eq!(msg.sender_peer_name, "y");
    }

    #[test]
    fn ignores_unknown_fields() {
        let bytes = br#"{"Message":"tick","SenderID":"x","SenderPeerName":"y","Epoch":7}"#;
        assert!(TickMessage::from_bytes(bytes).is_ok());
    }

    #[test]
    fn missing_fields_decode_empty() {
        let msg = TickMessage::from_bytes(br#"{"Message":"tick"}"#).unwrap();
        assert_eq!(msg.content, "tick");
        assert!(msg.sender_id.is_empty());
        assert!(msg.sender_peer_name.is_empty());
    }

    #[test]
    fn malformed_payloads_fail() {
        for bytes in [&b"not json"[..], b"", b"[1,2,3]", b"\"tick\"", b"{\"Message\":"] {
            assert!(
                matches!(TickMessage::from_bytes(bytes), Err(WireError::Decode(_))),
                "expected decode failure for {:?}",
                String::from_utf8_lossy(bytes)
            );
        }
    }
}
