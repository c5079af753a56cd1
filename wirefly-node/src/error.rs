//! Error types for the wirefly runtime.

use thiserror::Error;
use wirefly_core::InvalidTickConfig;
use wirefly_types::WireError;

use crate::transport::TransportError;

/// Joining a topic failed.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The transport refused the subscription.
    #[error("failed to join topic '{topic}': {source}")]
    Join {
        /// Topic we tried to join.
        topic: String,
        /// Transport failure.
        #[source]
        source: TransportError,
    },
}

/// Publishing a tick failed.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The record could not be encoded.
    #[error("encoding failed: {0}")]
    Encode(#[from] WireError),

    /// The transport rejected the bytes.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Errors starting or stopping a [`Node`](crate::Node).
#[derive(Debug, Error)]
pub enum NodeError {
    /// Relay setup failed.
    #[error(transparent)]
    Relay(#[from] RelayError),

    /// Oscillator tunables rejected.
    #[error("invalid tick configuration: {0}")]
    Tick(#[from] InvalidTickConfig),

    /// The engine task panicked or was aborted.
    #[error("engine task failed: {0}")]
    Engine(#[from] tokio::task::JoinError),
}
