//! # wirefly-types
//!
//! Wire format types for the wirefly tick synchronization protocol.
//!
//! This crate provides the foundational types shared by every wirefly crate:
//! - [`PeerId`] - Identity of a peer on the broadcast network
//! - [`TickMessage`] - The record every peer broadcasts when it ticks
//! - [`Datagram`] - Envelope used by the UDP transport
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod datagram;
mod error;
mod ids;
mod messages;

pub use datagram::{Datagram, DATAGRAM_VERSION, MAX_DATAGRAM_SIZE};
pub use error::WireError;
pub use ids::PeerId;
pub use messages::TickMessage;
