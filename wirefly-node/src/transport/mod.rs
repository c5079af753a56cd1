//! Transport abstraction for wirefly.
//!
//! This module provides the boundary between the relay and the broadcast
//! network (UDP flooding, in-memory hub for testing).
//!
//! # Design
//!
//! The transport is topic-oriented:
//! - `join()` subscribes to a topic and returns a [`Subscription`]
//! - `publish()` broadcasts bytes to every current topic member
//! - `next_message()` blocks until bytes arrive or the subscription closes
//! - `list_peers()` snapshots the visible topic members
//!
//! Delivery is at-least-once and unordered across senders. A publisher may
//! receive its own messages; filtering them is the relay's job.
//!
//! # Example
//!
//! ```ignore
//! let hub = MemoryHub::new();
//! let transport = hub.transport(PeerId::random());
//! let sub = transport.join("tick-primary").await?;
//! sub.publish(b"hello").await?;
//! let inbound = sub.next_message().await?;
//! ```

mod memory;
mod udp;

pub use memory::{MemoryHub, MemorySubscription, MemoryTransport, Published};
pub use udp::{UdpConfig, UdpSubscription, UdpTransport, DEFAULT_PEER_TTL, DEFAULT_PORT};

use async_trait::async_trait;
use thiserror::Error;
use wirefly_types::PeerId;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Joining the topic failed.
    #[error("join failed: {0}")]
    JoinFailed(String),

    /// The subscription is permanently closed.
    #[error("subscription closed")]
    Closed,

    /// Publish failed.
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bytes delivered on a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// Transport-level identity of the peer that delivered the bytes.
    pub from: PeerId,
    /// Raw payload.
    pub data: Vec<u8>,
}

/// A broadcast network the local peer can join topics on.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Handle returned by [`Transport::join`].
    type Subscription: Subscription + 'static;

    /// Identity of the local peer on this transport.
    fn local_id(&self) -> PeerId;

    /// Subscribe to a topic.
    async fn join(&self, topic: &str) -> Result<Self::Subscription, TransportError>;
}

/// A live subscription to one topic.
#[async_trait]
pub trait Subscription: Send + Sync {
    /// Broadcast bytes to all current topic members.
    ///
    /// Does not wait for delivery.
    async fn publish(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Wait for the next delivery.
    ///
    /// [`TransportError::Closed`] is terminal: once returned, every later
    /// call returns it too.
    async fn next_message(&self) -> Result<Inbound, TransportError>;

    /// Peers currently visible on the topic, excluding ourselves.
    fn list_peers(&self) -> Vec<PeerId>;
}
