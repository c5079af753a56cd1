//! Node - one peer with its relay, engine and display stream wired up.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;
use wirefly_core::{LocalPeer, TickConfig};
use wirefly_types::PeerId;

use crate::display::{display_channel, DisplayStream, OverflowPolicy, DISPLAY_CAPACITY};
use crate::engine::{EngineReport, TickEngine};
use crate::error::NodeError;
use crate::relay::{MessageRelay, INBOUND_CAPACITY};
use crate::transport::{Subscription, Transport};

/// Topic joined when none is configured.
pub const DEFAULT_TOPIC: &str = "tick-primary";

/// How to start a [`Node`].
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOptions {
    /// Topic to join.
    pub topic: String,
    /// Display name carried in every tick.
    pub peer_name: String,
    /// Oscillator tunables.
    pub tick: TickConfig,
    /// Inbound stream capacity.
    pub inbound_capacity: usize,
    /// Display stream capacity.
    pub display_capacity: usize,
    /// Display overflow behavior.
    pub display_overflow: OverflowPolicy,
    /// Initial phase offset in subticks.
    pub start_subtick: u32,
}

impl NodeOptions {
    /// Options with default tunables and buffers.
    pub fn new(topic: impl Into<String>, peer_name: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            peer_name: peer_name.into(),
            tick: TickConfig::default(),
            inbound_capacity: INBOUND_CAPACITY,
            display_capacity: DISPLAY_CAPACITY,
            display_overflow: OverflowPolicy::default(),
            start_subtick: 0,
        }
    }
}

/// A running peer.
///
/// Dropping a node without calling [`Node::shutdown`] also stops its engine.
pub struct Node<S: Subscription> {
    relay: Arc<MessageRelay<S>>,
    display: Option<DisplayStream>,
    shutdown: watch::Sender<bool>,
    engine: JoinHandle<EngineReport>,
}

impl<S: Subscription + 'static> Node<S> {
    /// Join the topic and start ticking.
    ///
    /// # Errors
    ///
    /// Fails if the tunables are invalid or the topic cannot be joined.
    pub async fn start<T>(transport: &T, options: NodeOptions) -> Result<Self, NodeError>
    where
        T: Transport<Subscription = S>,
    {
        options.tick.validate()?;

        let (relay, inbound) = MessageRelay::join(
            transport,
            &options.topic,
            &options.peer_name,
            options.inbound_capacity,
        )
        .await?;
        let relay = Arc::new(relay);

        let (sink, display) = display_channel(options.display_capacity, options.display_overflow);
        let engine = TickEngine::starting_at(
            options.tick,
            Arc::clone(&relay),
            inbound,
            sink,
            options.start_subtick,
        );

        let (shutdown, signal) = watch::channel(false);
        let engine = engine.spawn(signal);

        info!(
            topic = %options.topic,
            name = %options.peer_name,
            peer = %relay.self_id().short(),
            "node started"
        );

        Ok(Self {
            relay,
            display: Some(display),
            shutdown,
            engine,
        })
    }

    /// Shared relay handle.
    pub fn relay(&self) -> &Arc<MessageRelay<S>> {
        &self.relay
    }

    /// Snapshot of the peers visible on the topic.
    pub fn list_peers(&self) -> Vec<PeerId> {
        self.relay.list_peers()
    }

    /// Our identity as shown on self ticks.
    pub fn local_peer(&self) -> &LocalPeer {
        self.relay.local_peer()
    }

    /// Take the display stream. `None` after the first call.
    pub fn take_display(&mut self) -> Option<DisplayStream> {
        self.display.take()
    }

    /// Check if the engine task is still running.
    pub fn is_running(&self) -> bool {
        !self.engine.is_finished()
    }

    /// Stop the engine and wait for it.
    pub async fn shutdown(self) -> Result<EngineReport, NodeError> {
        self.shutdown.send_replace(true);
        let report = self.engine.await?;
        info!(exit = ?report.exit, cycles = report.stats.cycles, "node stopped");
        Ok(report)
    }
}

impl<S: Subscription> std::fmt::Debug for Node<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("relay", &self.relay)
            .field("running", &!self.engine.is_finished())
            .finish()
    }
}
