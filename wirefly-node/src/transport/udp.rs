//! UDP flood transport.
//!
//! Every publish is wrapped in a [`Datagram`] and sent to each known peer
//! address: the configured bootstrap peers plus every address that has sent
//! us a datagram for the joined topic. There is no discovery beyond that.

use super::{Inbound, Subscription, Transport, TransportError};
use crate::shutdown;
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use wirefly_types::{Datagram, PeerId, MAX_DATAGRAM_SIZE};

/// Default UDP port.
pub const DEFAULT_PORT: u16 = 4747;

/// Default time a silent peer stays in the peer list.
pub const DEFAULT_PEER_TTL: Duration = Duration::from_secs(10);

/// Buffered deliveries between the receive task and the subscription.
const RECEIVE_BUFFER: usize = 256;

/// UDP transport settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpConfig {
    /// Local bind address.
    pub listen: SocketAddr,
    /// Bootstrap peer addresses.
    pub peers: Vec<SocketAddr>,
    /// How long a peer stays listed after its last datagram.
    pub peer_ttl: Duration,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            peers: Vec::new(),
            peer_ttl: DEFAULT_PEER_TTL,
        }
    }
}

/// Broadcast transport over a single UDP socket.
///
/// One topic may be joined per transport.
#[derive(Debug)]
pub struct UdpTransport {
    local_id: PeerId,
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    config: UdpConfig,
    shutdown: Arc<watch::Sender<bool>>,
    joined: AtomicBool,
}

impl UdpTransport {
    /// Bind the socket described by `config`.
    pub async fn bind(local_id: PeerId, config: UdpConfig) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(config.listen).await?;
        let local_addr = socket.local_addr()?;
        let (shutdown, _) = watch::channel(false);

        info!(%local_addr, peer_id = %local_id.short(), "UDP transport bound");

        Ok(Self {
            local_id,
            socket: Arc::new(socket),
            local_addr,
            config,
            shutdown: Arc::new(shutdown),
            joined: AtomicBool::new(false),
        })
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop the receive task.
    ///
    /// The subscription drains what was already received and then reports
    /// [`TransportError::Closed`].
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

#[async_trait]
impl Transport for UdpTransport {
    type Subscription = UdpSubscription;

    fn local_id(&self) -> PeerId {
        self.local_id
    }

    async fn join(&self, topic: &str) -> Result<UdpSubscription, TransportError> {
        if *self.shutdown.borrow() {
            return Err(TransportError::JoinFailed("transport shut down".into()));
        }
        if self.joined.swap(true, Ordering::SeqCst) {
            return Err(TransportError::JoinFailed(
                "a topic is already joined on this socket".into(),
            ));
        }

        let peers = Arc::new(Mutex::new(PeerTable::new(
            &self.config.peers,
            self.local_addr,
            self.config.peer_ttl,
        )));
        let (tx, rx) = mpsc::channel(RECEIVE_BUFFER);

        let task = tokio::spawn(receive_loop(
            Arc::clone(&self.socket),
            topic.to_string(),
            self.local_id,
            Arc::clone(&peers),
            tx,
            self.shutdown.subscribe(),
        ));

        debug!(topic, bootstrap = self.config.peers.len(), "joined topic over UDP");

        Ok(UdpSubscription {
            topic: topic.to_string(),
            local_id: self.local_id,
            socket: Arc::clone(&self.socket),
            peers,
            shutdown: Arc::clone(&self.shutdown),
            rx: tokio::sync::Mutex::new(rx),
            task,
        })
    }
}

/// Subscription to the topic joined on a [`UdpTransport`].
#[derive(Debug)]
pub struct UdpSubscription {
    topic: String,
    local_id: PeerId,
    socket: Arc<UdpSocket>,
    peers: Arc<Mutex<PeerTable>>,
    shutdown: Arc<watch::Sender<bool>>,
    rx: tokio::sync::Mutex<mpsc::Receiver<Inbound>>,
    task: JoinHandle<()>,
}

impl UdpSubscription {
    fn peers(&self) -> MutexGuard<'_, PeerTable> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for UdpSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
impl Subscription for UdpSubscription {
    async fn publish(&self, data: &[u8]) -> Result<(), TransportError> {
        if *self.shutdown.borrow() {
            return Err(TransportError::Closed);
        }

        let bytes = Datagram::new(self.topic.as_str(), self.local_id, data.to_vec())
            .to_bytes()
            .map_err(|e| TransportError::PublishFailed(e.to_string()))?;

        let targets = self.peers().targets(Instant::now());
        if targets.is_empty() {
            trace!(topic = %self.topic, "no known peers, publish goes nowhere");
            return Ok(());
        }

        let mut failures = 0;
        let mut last_error = None;
        for addr in &targets {
            if let Err(e) = self.socket.send_to(&bytes, addr).await {
                debug!(%addr, error = %e, "send failed");
                failures += 1;
                last_error = Some(e);
            }
        }

        match last_error {
            Some(e) if failures == targets.len() => Err(TransportError::PublishFailed(format!(
                "all {} sends failed, last: {}",
                failures, e
            ))),
            Some(_) => {
                warn!(failures, targets = targets.len(), "publish reached only some peers");
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn next_message(&self) -> Result<Inbound, TransportError> {
        let mut rx = self.rx.lock().await;
        rx.recv().await.ok_or(TransportError::Closed)
    }

    fn list_peers(&self) -> Vec<PeerId> {
        self.peers().live(self.local_id, Instant::now())
    }
}

async fn receive_loop(
    socket: Arc<UdpSocket>,
    topic: String,
    local_id: PeerId,
    peers: Arc<Mutex<PeerTable>>,
    tx: mpsc::Sender<Inbound>,
    mut stop: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        let received = tokio::select! {
            _ = shutdown::requested(&mut stop) => break,
            received = socket.recv_from(&mut buf) => received,
        };

        let (len, addr) = match received {
            Ok(received) => received,
            Err(e) => {
                warn!("UDP receive error: {}", e);
                continue;
            }
        };

        let datagram = match Datagram::from_bytes(&buf[..len]) {
            Ok(datagram) => datagram,
            Err(e) => {
                debug!(%addr, error = %e, "dropping undecodable datagram");
                continue;
            }
        };

        if datagram.topic != topic {
            trace!(%addr, topic = %datagram.topic, "ignoring other topic");
            continue;
        }

        if datagram.sender != local_id {
            peers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .observe(addr, datagram.sender, Instant::now());
        }

        let inbound = Inbound {
            from: datagram.sender,
            data: datagram.payload,
        };
        if tx.send(inbound).await.is_err() {
            break; // Subscription dropped
        }
    }

    debug!(topic, "UDP receive loop stopped");
}

/// Known peer addresses.
///
/// Learned addresses are forgotten once silent for longer than `ttl`.
/// Bootstrap addresses are always kept.
#[derive(Debug)]
struct PeerTable {
    local_addr: SocketAddr,
    bootstrap: Vec<SocketAddr>,
    ttl: Duration,
    seen: HashMap<SocketAddr, Seen>,
}

#[derive(Debug, Clone, Copy)]
struct Seen {
    id: PeerId,
    at: Instant,
}

impl PeerTable {
    fn new(bootstrap: &[SocketAddr], local_addr: SocketAddr, ttl: Duration) -> Self {
        Self {
            local_addr,
            bootstrap: bootstrap.to_vec(),
            ttl,
            seen: HashMap::new(),
        }
    }

    fn observe(&mut self, addr: SocketAddr, id: PeerId, at: Instant) {
        self.expire(at);
        self.seen.insert(addr, Seen { id, at });
    }

    fn expire(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.seen
            .retain(|_, seen| now.saturating_duration_since(seen.at) <= ttl);
    }

    /// Every address a publish is sent to.
    fn targets(&mut self, now: Instant) -> Vec<SocketAddr> {
        self.expire(now);
        let mut targets: Vec<SocketAddr> = self
            .bootstrap
            .iter()
            .chain(self.seen.keys())
            .copied()
            .filter(|addr| *addr != self.local_addr)
            .collect();
        targets.sort();
        targets.dedup();
        targets
    }

    /// Peers heard from within `ttl` of `now`.
    fn live(&self, local_id: PeerId, now: Instant) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = self
            .seen
            .values()
            .filter(|seen| seen.id != local_id && now.saturating_duration_since(seen.at) <= self.ttl)
            .map(|seen| seen.id)
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}
