//! # wirefly-node
//!
//! Runtime side of wirefly: everything that touches the network, timers or
//! channels.
//!
//! ## Features
//!
//! - **Transport Abstraction**: Pluggable broadcast transport (UDP, in-memory hub)
//! - **Message Relay**: Decodes and filters topic traffic into a bounded stream
//! - **Tick Engine**: Drives the pure phase machine from wirefly-core
//! - **Display Stream**: Bounded, ordered events for an external renderer
//!
//! ```text
//! transport → MessageRelay → TickEngine → DisplayStream → renderer
//!                  ↑              │
//!                  └── publish ───┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use wirefly_node::{MemoryHub, Node, NodeOptions};
//! use wirefly_types::PeerId;
//!
//! let hub = MemoryHub::new();
//! let transport = hub.transport(PeerId::random());
//! let mut node = Node::start(&transport, NodeOptions::new("tick-primary", "alice")).await?;
//!
//! let mut display = node.take_display().unwrap();
//! while let Some(event) = display.recv().await {
//!     println!("<{}>: {}", event.sender_peer_name, event.line());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod display;
pub mod engine;
pub mod error;
pub mod node;
pub mod relay;
mod shutdown;
pub mod transport;

pub use config::{Config, ConfigError};
pub use display::{
    display_channel, DisplayClosed, DisplaySink, DisplayStream, OverflowPolicy, DISPLAY_CAPACITY,
};
pub use engine::{EngineExit, EngineReport, EngineStats, StepOutcome, TickEngine};
pub use error::{NodeError, PublishError, RelayError};
pub use node::{Node, NodeOptions, DEFAULT_TOPIC};
pub use relay::{InboundStream, MessageRelay, TryNext, INBOUND_CAPACITY};
pub use transport::{
    Inbound, MemoryHub, MemorySubscription, MemoryTransport, Published, Subscription, Transport,
    TransportError, UdpConfig, UdpSubscription, UdpTransport, DEFAULT_PEER_TTL, DEFAULT_PORT,
};
