//! Terminal rendering of display events and peer lists.

use std::io::{self, Write};
use wirefly_core::DisplayEvent;
use wirefly_node::{DisplaySink, DisplayStream};
use wirefly_types::PeerId;

/// Writes one line per display event and the peer list when it changes.
pub struct Renderer<W: Write> {
    out: W,
    last_peers: Option<Vec<PeerId>>,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_peers: None,
        }
    }

    /// `<peer-name>: <line>`
    pub fn event(&mut self, event: &DisplayEvent) -> io::Result<()> {
        writeln!(self.out, "{}: {}", event.sender_peer_name, event.line())?;
        self.out.flush()
    }

    /// Print the peer list if it differs from the last one printed.
    ///
    /// Returns whether anything was written.
    pub fn peers(&mut self, mut peers: Vec<PeerId>) -> io::Result<bool> {
        peers.sort();
        if self.last_peers.as_ref() == Some(&peers) {
            return Ok(false);
        }

        let listed: Vec<String> = peers.iter().map(PeerId::short).collect();
        if listed.is_empty() {
            writeln!(self.out, "peers (0): none")?;
        } else {
            writeln!(self.out, "peers ({}): {}", listed.len(), listed.join(", "))?;
        }
        self.out.flush()?;

        self.last_peers = Some(peers);
        Ok(true)
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

/// Copy one node's display stream into a shared one.
///
/// Ends when the node's engine stops or the shared stream is gone.
pub async fn forward(mut display: DisplayStream, shared: DisplaySink) {
    while let Some(event) = display.recv().await {
        if shared.emit(event).await.is_err() {
            break;
        }
    }
}
