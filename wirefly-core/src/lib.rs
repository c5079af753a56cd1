//! # wirefly-core
//!
//! Pure logic for wirefly (no I/O, instant tests).
//!
//! This crate implements the pulse-coupled oscillator that lets peers
//! converge on a common tick rhythm, without any network, timer or channel.
//!
//! ## Design Philosophy
//!
//! [`TickPhase`] is **pure** - it takes one observation per subtick and
//! returns the actions to perform. This enables:
//! - Instant unit tests (no mocks, no async, no sleeping)
//! - Deterministic behavior (same observations → same actions)
//! - Multi-node convergence simulations in plain loops
//!
//! The actual I/O (polling the inbound stream, publishing, emitting display
//! events, sleeping between subticks) is performed by `wirefly-node`, which
//! interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod event;
pub mod phase;

pub use event::{DisplayEvent, DisplayKind, LocalPeer};
pub use phase::{
    bump, Action, InvalidTickConfig, Observation, PhaseState, TickConfig, TickPhase, BUMP_FACTOR,
    SUBTICKS_PER_CYCLE, SUBTICK_DURATION, TICK_CONTENT,
};
