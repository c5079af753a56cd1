//! MessageRelay - bridges a topic subscription to a typed inbound stream.
//!
//! Joining a topic starts one decode task. It pulls raw deliveries from the
//! transport, decodes them into [`TickMessage`]s, drops our own traffic and
//! pushes the rest onto a bounded stream. When the stream is full the task
//! waits, so network ingestion runs at the rate the engine consumes.
//!
//! ```text
//! Subscription::next_message → decode → self filter → InboundStream
//! ```
//!
//! The task stops for good the first time the transport reports an error,
//! which closes the stream exactly once. Undecodable payloads are logged
//! and skipped; they never stop the task.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tracing::{debug, trace};
use wirefly_core::LocalPeer;
use wirefly_types::{PeerId, TickMessage};

use crate::error::{PublishError, RelayError};
use crate::transport::{Subscription, Transport};

/// Default inbound stream capacity.
pub const INBOUND_CAPACITY: usize = 128;

/// Relay for one joined topic.
///
/// Shared between the engine (publishing) and the renderer (peer list);
/// wrap it in an [`Arc`]. Dropping the last handle stops the decode task.
pub struct MessageRelay<S: Subscription> {
    subscription: Arc<S>,
    topic: String,
    self_id: PeerId,
    local: LocalPeer,
    reader: JoinHandle<()>,
}

impl<S: Subscription + 'static> MessageRelay<S> {
    /// Join `topic` and start decoding.
    ///
    /// `capacity` bounds the returned stream (at least 1).
    pub async fn join<T>(
        transport: &T,
        topic: &str,
        peer_name: &str,
        capacity: usize,
    ) -> Result<(Self, InboundStream), RelayError>
    where
        T: Transport<Subscription = S>,
    {
        let subscription = transport
            .join(topic)
            .await
            .map_err(|source| RelayError::Join {
                topic: topic.to_string(),
                source,
            })?;
        let subscription = Arc::new(subscription);

        let self_id = transport.local_id();
        let local = LocalPeer::new(self_id.to_string(), peer_name);
        let (tx, rx) = mpsc::channel(capacity.max(1));

        let reader = tokio::spawn(decode_loop(
            Arc::clone(&subscription),
            self_id,
            local.id.clone(),
            tx,
        ));

        debug!(topic, peer = %self_id.short(), name = peer_name, "relay joined");

        let relay = Self {
            subscription,
            topic: topic.to_string(),
            self_id,
            local,
            reader,
        };
        Ok((relay, InboundStream::new(rx)))
    }

    /// Broadcast a tick carrying our identity and name.
    ///
    /// Returns once the transport accepted the bytes; delivery is not
    /// confirmed.
    pub async fn publish(&self, content: &str) -> Result<(), PublishError> {
        let message = TickMessage::new(content, self.local.id.as_str(), self.local.name.as_str());
        let bytes = message.to_bytes()?;
        self.subscription.publish(&bytes).await?;
        Ok(())
    }

    /// Snapshot of the peers visible on the topic.
    pub fn list_peers(&self) -> Vec<PeerId> {
        self.subscription.list_peers()
    }

    /// Our transport identity.
    pub fn self_id(&self) -> PeerId {
        self.self_id
    }

    /// Our display name.
    pub fn peer_name(&self) -> &str {
        &self.local.name
    }

    /// Joined topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Identity stamped on self-tick display events.
    pub fn local_peer(&self) -> &LocalPeer {
        &self.local
    }

    /// Check if the decode task is still running.
    pub fn is_reading(&self) -> bool {
        !self.reader.is_finished()
    }
}

impl<S: Subscription> Drop for MessageRelay<S> {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl<S: Subscription> std::fmt::Debug for MessageRelay<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRelay")
            .field("topic", &self.topic)
            .field("self_id", &self.self_id)
            .field("peer_name", &self.local.name)
            .finish()
    }
}

async fn decode_loop<S: Subscription>(
    subscription: Arc<S>,
    self_id: PeerId,
    self_id_text: String,
    tx: mpsc::Sender<TickMessage>,
) {
    loop {
        let inbound = match subscription.next_message().await {
            Ok(inbound) => inbound,
            Err(e) => {
                debug!(error = %e, "transport read failed, closing inbound stream");
                break;
            }
        };

        if inbound.from == self_id {
            trace!("dropping own delivery");
            continue;
        }

        let message = match TickMessage::from_bytes(&inbound.data) {
            Ok(message) => message,
            Err(e) => {
                debug!(from = %inbound.from.short(), error = %e, "dropping undecodable payload");
                continue;
            }
        };

        if message.sender_id == self_id_text {
            trace!("dropping message claiming our id");
            continue;
        }

        // Blocks while the stream is full
        if tx.send(message).await.is_err() {
            debug!("inbound stream dropped, stopping decode task");
            break;
        }
    }
}

/// Result of a non-suspending read from an [`InboundStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TryNext {
    /// A message was waiting.
    Message(TickMessage),
    /// Nothing is waiting right now.
    Empty,
    /// The decode task has stopped and everything buffered was read.
    /// Terminal.
    Closed,
}

/// Decoded messages from other peers, in receipt order.
#[derive(Debug)]
pub struct InboundStream {
    rx: mpsc::Receiver<TickMessage>,
}

impl InboundStream {
    fn new(rx: mpsc::Receiver<TickMessage>) -> Self {
        Self { rx }
    }

    /// Take the next message without waiting.
    pub fn try_next(&mut self) -> TryNext {
        match self.rx.try_recv() {
            Ok(message) => TryNext::Message(message),
            Err(TryRecvError::Empty) => TryNext::Empty,
            Err(TryRecvError::Disconnected) => TryNext::Closed,
        }
    }

    /// Wait for the next message. `None` once the stream is closed.
    pub async fn recv(&mut self) -> Option<TickMessage> {
        self.rx.recv().await
    }
}
