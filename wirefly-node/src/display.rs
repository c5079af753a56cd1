//! Display event stream between the engine and a renderer.
//!
//! Bounded and ordered. What happens when the renderer falls behind is
//! chosen by [`OverflowPolicy`]: either the engine waits (which slows the
//! tick cycle down with it) or the oldest buffered events are discarded.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::warn;
use wirefly_core::DisplayEvent;

/// Default display stream capacity.
pub const DISPLAY_CAPACITY: usize = 128;

/// What a full display stream does with a new event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// The producer waits for room.
    #[default]
    Block,
    /// The oldest buffered event is discarded to make room.
    DropOldest,
}

/// The renderer has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("display stream has no consumer")]
pub struct DisplayClosed;

/// Create a display stream.
///
/// `capacity` is raised to at least 1.
pub fn display_channel(capacity: usize, policy: OverflowPolicy) -> (DisplaySink, DisplayStream) {
    let capacity = capacity.max(1);
    match policy {
        OverflowPolicy::Block => {
            let (tx, rx) = mpsc::channel(capacity);
            (
                DisplaySink { inner: SinkInner::Block(tx) },
                DisplayStream::new(StreamInner::Block(rx)),
            )
        }
        OverflowPolicy::DropOldest => {
            let (tx, rx) = broadcast::channel(capacity);
            (
                DisplaySink { inner: SinkInner::DropOldest(tx) },
                DisplayStream::new(StreamInner::DropOldest(rx)),
            )
        }
    }
}

/// Producing half, owned by the engine.
#[derive(Debug, Clone)]
pub struct DisplaySink {
    inner: SinkInner,
}

#[derive(Debug, Clone)]
enum SinkInner {
    Block(mpsc::Sender<DisplayEvent>),
    DropOldest(broadcast::Sender<DisplayEvent>),
}

impl DisplaySink {
    /// Hand an event to the renderer.
    ///
    /// With [`OverflowPolicy::Block`] this waits while the stream is full.
    pub async fn emit(&self, event: DisplayEvent) -> Result<(), DisplayClosed> {
        match &self.inner {
            SinkInner::Block(tx) => tx.send(event).await.map_err(|_| DisplayClosed),
            SinkInner::DropOldest(tx) => tx.send(event).map(|_| ()).map_err(|_| DisplayClosed),
        }
    }

    /// Check if the renderer dropped its stream.
    pub fn is_closed(&self) -> bool {
        match &self.inner {
            SinkInner::Block(tx) => tx.is_closed(),
            SinkInner::DropOldest(tx) => tx.receiver_count() == 0,
        }
    }

    /// Policy this sink was created with.
    pub fn policy(&self) -> OverflowPolicy {
        match self.inner {
            SinkInner::Block(_) => OverflowPolicy::Block,
            SinkInner::DropOldest(_) => OverflowPolicy::DropOldest,
        }
    }
}

/// Consuming half, owned by the renderer.
#[derive(Debug)]
pub struct DisplayStream {
    inner: StreamInner,
    dropped: u64,
}

#[derive(Debug)]
enum StreamInner {
    Block(mpsc::Receiver<DisplayEvent>),
    DropOldest(broadcast::Receiver<DisplayEvent>),
}

impl DisplayStream {
    fn new(inner: StreamInner) -> Self {
        Self { inner, dropped: 0 }
    }

    /// Wait for the next event. `None` once the engine is gone and the
    /// stream is drained.
    pub async fn recv(&mut self) -> Option<DisplayEvent> {
        match &mut self.inner {
            StreamInner::Block(rx) => rx.recv().await,
            StreamInner::DropOldest(rx) => loop {
                match rx.recv().await {
                    Ok(event) => return Some(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        self.dropped += skipped;
                        warn!(skipped, total = self.dropped, "renderer behind, dropped oldest display events");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            },
        }
    }

    /// Events discarded so far under [`OverflowPolicy::DropOldest`].
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wirefly_core::LocalPeer;
    use wirefly_types::TickMessage;

    fn external(n: usize) -> DisplayEvent {
        DisplayEvent::external(&TickMessage::new(format!("tick-{}", n), "peer-b", "bob"))
    }

    // ===========================================
    // Block Policy Tests
    // ===========================================

    #[tokio::test]
    async fn block_preserves_order() {
        let (sink, mut stream) = display_channel(8, OverflowPolicy::Block);

        sink.emit(external(0)).await.unwrap();
        sink.emit(DisplayEvent::self_tick(&LocalPeer::new("a", "alice"))).await.unwrap();
        sink.emit(external(1)).await.unwrap();

        assert_eq!(stream.recv().await.unwrap().content, "tick-0");
        assert!(stream.recv().await.unwrap().is_self());
        assert_eq!(stream.recv().await.unwrap().content, "tick-1");
    }

    #[tokio::test]
    async fn block_waits_when_full() {
        let (sink, mut stream) = display_channel(2, OverflowPolicy::Block);
        sink.emit(external(0)).await.unwrap();
        sink.emit(external(1)).await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), sink.emit(external(2))).await;
        assert!(blocked.is_err(), "emit should wait while the stream is full");

        stream.recv().await.unwrap();
        sink.emit(external(2)).await.unwrap();
        assert_eq!(stream.dropped(), 0);
    }

    // ===========================================
    // DropOldest Policy Tests
    // ===========================================

    #[tokio::test]
    async fn drop_oldest_never_waits_and_counts_losses() {
        let (sink, mut stream) = display_channel(4, OverflowPolicy::DropOldest);

        for n in 0..10 {
            sink.emit(external(n)).await.unwrap();
        }
        drop(sink);

        let mut seen = Vec::new();
        while let Some(event) = stream.recv().await {
            seen.push(event.content);
        }

        assert_eq!(seen, vec!["tick-6", "tick-7", "tick-8", "tick-9"]);
        assert_eq!(stream.dropped(), 6);
    }

    // ===========================================
    // Closure Tests
    // ===========================================

    #[tokio::test]
    async fn emit_fails_without_consumer() {
        for policy in [OverflowPolicy::Block, OverflowPolicy::DropOldest] {
            let (sink, stream) = display_channel(4, policy);
            drop(stream);

            assert!(sink.is_closed());
            assert_eq!(sink.emit(external(0)).await, Err(DisplayClosed));
            assert_eq!(sink.policy(), policy);
        }
    }

    #[tokio::test]
    async fn stream_ends_after_sink_dropped() {
        let (sink, mut stream) = display_channel(4, OverflowPolicy::Block);
        sink.emit(external(0)).await.unwrap();
        drop(sink);

        assert!(stream.recv().await.is_some());
        assert!(stream.recv().await.is_none());
    }

    #[test]
    fn zero_capacity_is_raised() {
        let (sink, _stream) = display_channel(0, OverflowPolicy::Block);
        assert!(!sink.is_closed());
    }
}
