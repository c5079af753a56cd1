//! In-memory broadcast hub for testing and local demos.
//!
//! Every transport created from one [`MemoryHub`] shares a simulated
//! network. Publishing on a topic delivers to every member of that topic,
//! including the publisher, the way gossip pubsub loops messages back.
//! Allows injecting raw bytes and forcing publish failures. A hub built
//! with [`MemoryHub::capturing`] also records everything published for
//! verification; a plain hub keeps nothing.

use super::{Inbound, Subscription, Transport, TransportError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use wirefly_types::PeerId;

/// A captured publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    /// Topic the bytes were published on.
    pub topic: String,
    /// Publishing peer.
    pub from: PeerId,
    /// Published bytes.
    pub data: Vec<u8>,
}

/// Shared simulated network.
#[derive(Debug, Default, Clone)]
pub struct MemoryHub {
    inner: Arc<Mutex<HubInner>>,
}

#[derive(Debug, Default)]
struct HubInner {
    topics: HashMap<String, Vec<Member>>,
    capture: bool,
    published: Vec<Published>,
    fail_next_publish: Option<String>,
    closed: bool,
}

#[derive(Debug)]
struct Member {
    peer: PeerId,
    tx: mpsc::UnboundedSender<Inbound>,
}

impl HubInner {
    /// Deliver to every live member of `topic`, returning how many got it.
    fn deliver(&mut self, topic: &str, from: PeerId, data: &[u8]) -> usize {
        let Some(members) = self.topics.get_mut(topic) else {
            return 0;
        };
        members.retain(|m| !m.tx.is_closed());

        let mut delivered = 0;
        for member in members.iter() {
            let inbound = Inbound {
                from,
                data: data.to_vec(),
            };
            if member.tx.send(inbound).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}

impl MemoryHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty hub that records every publish.
    ///
    /// The record is never trimmed, so use this for tests only.
    pub fn capturing() -> Self {
        let hub = Self::default();
        hub.lock().capture = true;
        hub
    }

    /// Create a transport for `peer` on this hub.
    pub fn transport(&self, peer: PeerId) -> MemoryTransport {
        MemoryTransport {
            hub: self.clone(),
            peer,
        }
    }

    /// Deliver raw bytes on `topic` as if `from` had published them.
    ///
    /// Bypasses failure injection and capture. Returns the number of
    /// subscriptions the bytes were delivered to.
    pub fn inject(&self, topic: &str, from: PeerId, data: &[u8]) -> usize {
        self.lock().deliver(topic, from, data)
    }

    /// Cause the next publish on any subscription to fail.
    pub fn fail_next_publish(&self, reason: &str) {
        self.lock().fail_next_publish = Some(reason.to_string());
    }

    /// Get everything published so far.
    ///
    /// Always empty unless the hub was built with [`MemoryHub::capturing`].
    pub fn published(&self) -> Vec<Published> {
        self.lock().published.clone()
    }

    /// Tear the network down.
    ///
    /// Every subscription drains what was already delivered and then
    /// reports [`TransportError::Closed`]. Publishing and joining fail
    /// afterwards.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.topics.clear();
    }

    /// Check if [`MemoryHub::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One peer's view of a [`MemoryHub`].
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    hub: MemoryHub,
    peer: PeerId,
}

impl MemoryTransport {
    /// The hub this transport belongs to.
    pub fn hub(&self) -> &MemoryHub {
        &self.hub
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    type Subscription = MemorySubscription;

    fn local_id(&self) -> PeerId {
        self.peer
    }

    async fn join(&self, topic: &str) -> Result<MemorySubscription, TransportError> {
        let mut inner = self.hub.lock();
        if inner.closed {
            return Err(TransportError::JoinFailed("hub closed".into()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        inner.topics.entry(topic.to_string()).or_default().push(Member {
            peer: self.peer,
            tx,
        });

        Ok(MemorySubscription {
            hub: self.hub.clone(),
            topic: topic.to_string(),
            peer: self.peer,
            rx: tokio::sync::Mutex::new(rx),
        })
    }
}

/// Subscription to one topic on a [`MemoryHub`].
#[derive(Debug)]
pub struct MemorySubscription {
    hub: MemoryHub,
    topic: String,
    peer: PeerId,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Inbound>>,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn publish(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.hub.lock();

        if inner.closed {
            return Err(TransportError::Closed);
        }

        // Check for forced failure
        if let Some(reason) = inner.fail_next_publish.take() {
            return Err(TransportError::PublishFailed(reason));
        }

        if inner.capture {
            inner.published.push(Published {
                topic: self.topic.clone(),
                from: self.peer,
                data: data.to_vec(),
            });
        }
        inner.deliver(&self.topic, self.peer, data);
        Ok(())
    }

    async fn next_message(&self) -> Result<Inbound, TransportError> {
        let mut rx = self.rx.lock().await;
        rx.recv().await.ok_or(TransportError::Closed)
    }

    fn list_peers(&self) -> Vec<PeerId> {
        let inner = self.hub.lock();
        let mut peers: Vec<PeerId> = inner
            .topics
            .get(&self.topic)
            .map(|members| {
                members
                    .iter()
                    .filter(|m| m.peer != self.peer && !m.tx.is_closed())
                    .map(|m| m.peer)
                    .collect()
            })
            .unwrap_or_default();
        peers.sort();
        peers.dedup();
        peers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn next(sub: &MemorySubscription) -> Inbound {
        tokio::time::timeout(Duration::from_secs(1), sub.next_message())
            .await
            .expect("timed out waiting for delivery")
            .expect("subscription closed")
    }

    // ===========================================
    // Delivery Tests
    // ===========================================

    #[tokio::test]
    async fn publish_reaches_all_members_including_self() {
        let hub = MemoryHub::new();
        let (a, b) = (PeerId::random(), PeerId::random());
        let sub_a = hub.transport(a).join("t").await.unwrap();
        let sub_b = hub.transport(b).join("t").await.unwrap();

        sub_a.publish(b"hello").await.unwrap();

        let at_a = next(&sub_a).await;
        let at_b = next(&sub_b).await;
        assert_eq!(at_a.from, a);
        assert_eq!(at_b.from, a);
        assert_eq!(at_b.data, b"hello");
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let hub = MemoryHub::new();
        let sub_a = hub.transport(PeerId::random()).join("one").await.unwrap();
        let sub_b = hub.transport(PeerId::random()).join("two").await.unwrap();

        sub_a.publish(b"only-one").await.unwrap();

        let result = tokio::time::timeout(Duration::from_millis(50), sub_b.next_message()).await;
        assert!(result.is_err(), "topic two should not see topic one traffic");
    }

    #[tokio::test]
    async fn inject_delivers_raw_bytes() {
        let hub = MemoryHub::capturing();
        let sub = hub.transport(PeerId::random()).join("t").await.unwrap();
        let stranger = PeerId::random();

        assert_eq!(hub.inject("t", stranger, b"\x00garbage"), 1);

        let inbound = next(&sub).await;
        assert_eq!(inbound.from, stranger);
        assert_eq!(inbound.data, b"\x00garbage");
        assert!(hub.published().is_empty());
    }

    #[tokio::test]
    async fn published_captures_messages() {
        let hub = MemoryHub::capturing();
        let peer = PeerId::random();
        let sub = hub.transport(peer).join("t").await.unwrap();

        sub.publish(b"first").await.unwrap();
        sub.publish(b"second").await.unwrap();

        let published = hub.published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].data, b"first");
        assert_eq!(published[1].from, peer);
        assert_eq!(published[1].topic, "t");
    }

    #[tokio::test]
    async fn plain_hub_retains_nothing() {
        let hub = MemoryHub::new();
        let sub = hub.transport(PeerId::random()).join("t").await.unwrap();

        for _ in 0..1000 {
            sub.publish(b"tick").await.unwrap();
            next(&sub).await;
        }

        assert!(hub.published().is_empty());
        assert_eq!(hub.lock().published.capacity(), 0);
    }

    // ===========================================
    // Error Condition Tests
    // ===========================================

    #[tokio::test]
    async fn forced_publish_failure() {
        let hub = MemoryHub::capturing();
        let sub = hub.transport(PeerId::random()).join("t").await.unwrap();
        hub.fail_next_publish("no route");

        let result = sub.publish(b"data").await;
        assert!(matches!(result, Err(TransportError::PublishFailed(_))));

        // Next publish should work
        sub.publish(b"data").await.unwrap();
        assert_eq!(hub.published().len(), 1);
    }

    #[tokio::test]
    async fn close_drains_then_reports_closed() {
        let hub = MemoryHub::new();
        let sub = hub.transport(PeerId::random()).join("t").await.unwrap();
        sub.publish(b"before close").await.unwrap();

        hub.close();

        assert_eq!(next(&sub).await.data, b"before close");
        assert!(matches!(sub.next_message().await, Err(TransportError::Closed)));
        assert!(matches!(sub.next_message().await, Err(TransportError::Closed)));
        assert!(matches!(sub.publish(b"x").await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn join_after_close_fails() {
        let hub = MemoryHub::new();
        hub.close();

        let result = hub.transport(PeerId::random()).join("t").await;
        assert!(matches!(result, Err(TransportError::JoinFailed(_))));
        assert!(hub.is_closed());
    }

    // ===========================================
    // Peer List Tests
    // ===========================================

    #[tokio::test]
    async fn list_peers_excludes_self_and_dropped_members() {
        let hub = MemoryHub::new();
        let (a, b, c) = (PeerId::random(), PeerId::random(), PeerId::random());
        let sub_a = hub.transport(a).join("t").await.unwrap();
        let _sub_b = hub.transport(b).join("t").await.unwrap();
        let sub_c = hub.transport(c).join("t").await.unwrap();

        let peers = sub_a.list_peers();
        assert_eq!(peers.len(), 2);
        assert!(!peers.contains(&a));

        drop(sub_c);
        let peers = sub_a.list_peers();
        assert_eq!(peers, vec![b]);
    }

    #[tokio::test]
    async fn transport_clone_shares_hub() {
        let hub = MemoryHub::capturing();
        let transport = hub.transport(PeerId::random());
        let clone = transport.clone();

        let sub = clone.join("t").await.unwrap();
        sub.publish(b"x").await.unwrap();

        assert_eq!(transport.hub().published().len(), 1);
        assert_eq!(transport.local_id(), clone.local_id());
    }
}
