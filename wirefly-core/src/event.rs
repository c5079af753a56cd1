//! Display events emitted for the presentation layer.

use wirefly_types::TickMessage;

/// Content shown for our own ticks.
const SELF_TICK_CONTENT: &str = "Tick (Self)";

/// Identity of the local peer, carried into self-tick events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPeer {
    /// Displayed peer id.
    pub id: String,
    /// Human-readable name.
    pub name: String,
}

impl LocalPeer {
    /// Create a new local identity.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// What a display event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayKind {
    /// The local peer completed a cycle.
    SelfTick,
    /// A tick from another peer was observed.
    ExternalTick,
}

/// An event for the renderer.
///
/// Same shape as [`TickMessage`] today but internal-only; it is never put on
/// the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayEvent {
    /// Self or external tick.
    pub kind: DisplayKind,
    /// Event content.
    pub content: String,
    /// Displayed peer id of the ticking peer.
    pub sender_id: String,
    /// Human-readable name of the ticking peer.
    pub sender_peer_name: String,
}

impl DisplayEvent {
    /// Event for a tick heard from another peer.
    pub fn external(message: &TickMessage) -> Self {
        Self {
            kind: DisplayKind::ExternalTick,
            content: message.content.clone(),
            sender_id: message.sender_id.clone(),
            sender_peer_name: message.sender_peer_name.clone(),
        }
    }

    /// Event for our own completed cycle.
    pub fn self_tick(local: &LocalPeer) -> Self {
        Self {
            kind: DisplayKind::SelfTick,
            content: SELF_TICK_CONTENT.to_string(),
            sender_id: local.id.clone(),
            sender_peer_name: local.name.clone(),
        }
    }

    /// Whether this is one of our own ticks.
    pub fn is_self(&self) -> bool {
        self.kind == DisplayKind::SelfTick
    }

    /// Text body as a renderer shows it.
    pub fn line(&self) -> String {
        match self.kind {
            DisplayKind::SelfTick => self.content.clone(),
            DisplayKind::ExternalTick => format!("{} (external)", self.content),
        }
    }
}
