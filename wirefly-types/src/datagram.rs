//! Datagram - the UDP envelope that carries a topic payload.

use serde::{Deserialize, Serialize};

use crate::{PeerId, WireError};

/// Current datagram format version.
pub const DATAGRAM_VERSION: u8 = 1;

/// Largest encoded datagram we send or accept (fits a single UDP packet).
pub const MAX_DATAGRAM_SIZE: usize = 65_000;

/// The envelope wraps a topic payload with routing metadata.
///
/// The payload is opaque here; for wirefly topics it is a JSON
/// [`TickMessage`](crate::TickMessage).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datagram {
    /// Format version (currently 1)
    pub version: u8,
    /// Topic the payload was published on
    pub topic: String,
    /// Transport-level identity of the sender
    pub sender: PeerId,
    /// Topic payload
    pub payload: Vec<u8>,
}

impl Datagram {
    /// Create a new datagram for sending.
    pub fn new(topic: impl Into<String>, sender: PeerId, payload: Vec<u8>) -> Self {
        Self {
            version: DATAGRAM_VERSION,
            topic: topic.into(),
            sender,
            payload,
        }
    }

    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        let bytes = rmp_serde::to_vec(self).map_err(WireError::Serialization)?;
        if bytes.len() > MAX_DATAGRAM_SIZE {
            return Err(WireError::TooLarge {
                size: bytes.len(),
                limit: MAX_DATAGRAM_SIZE,
            });
        }
        Ok(bytes)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        let datagram: Self = rmp_serde::from_slice(bytes).map_err(WireError::Deserialization)?;
        if datagram.version != DATAGRAM_VERSION {
            return Err(WireError::UnsupportedVersion(datagram.version));
        }
        Ok(datagram)
    }
}
