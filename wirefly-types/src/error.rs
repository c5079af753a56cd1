//! Error types for wirefly wire formats.

use thiserror::Error;

/// Errors that can occur while encoding or decoding wirefly records.
#[derive(Debug, Error)]
pub enum WireError {
    /// JSON encoding of a tick record failed
    #[error("encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// JSON decoding of a tick record failed
    #[error("decoding failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// MessagePack serialization of a datagram failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] rmp_serde::encode::Error),

    /// MessagePack deserialization of a datagram failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] rmp_serde::decode::Error),

    /// Datagram format version we do not understand
    #[error("unsupported datagram version: {0}")]
    UnsupportedVersion(u8),

    /// A peer id string could not be parsed
    #[error("invalid peer id: {0}")]
    InvalidPeerId(String),

    /// Encoded datagram exceeds the transport limit
    #[error("datagram too large: {size} bytes (limit: {limit} bytes)")]
    TooLarge {
        /// Encoded size.
        size: usize,
        /// Maximum allowed size.
        limit: usize,
    },
}
