//! Test utilities for peer discovery.
//!
//! Controllable clocks and an in-memory transport for deterministic tests.
//! Enable with the `test-utils` feature flag.
//!
//! # Example
//!
//! ```rust,ignore
//! use seed_discovery::test_utils::ControllableTimeSource;
//! use seed_discovery::ports::TimeSource;
//!
//! let time = ControllableTimeSource::new(1000);
//! time.advance(60);
//! assert_eq!(time.now().as_secs(), 1060);
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::domain::{NodeId, PeerAddress, PexMessage, Timestamp, TransportError};
use crate::ports::{Listener, PeerConnection, TimeSource, Transport};

/// A wall clock that only moves when told to.
#[derive(Debug, Clone, Default)]
pub struct ControllableTimeSource {
    secs: Arc<AtomicU64>,
}

impl ControllableTimeSource {
    /// Start the clock at `secs`.
    pub fn new(secs: u64) -> Self {
        Self {
            secs: Arc::new(AtomicU64::new(secs)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, secs: u64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }

    /// Jump to an absolute time.
    pub fn set(&self, secs: u64) {
        self.secs.store(secs, Ordering::SeqCst);
    }
}

impl TimeSource for ControllableTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.secs.load(Ordering::SeqCst))
    }
}

/// Build a node id whose first byte is `byte`.
pub fn node_id(byte: u8) -> NodeId {
    let mut id = [0u8; 20];
    id[0] = byte;
    NodeId::new(id)
}

/// Build a node id from a 16-bit index.
pub fn indexed_node_id(index: u16) -> NodeId {
    let mut id = [0u8; 20];
    id[0] = 0xa0;
    id[1..3].copy_from_slice(&index.to_be_bytes());
    NodeId::new(id)
}

// ============================================================================
// In-memory transport
// ============================================================================

type Inbox = mpsc::UnboundedSender<Box<dyn PeerConnection>>;

/// Shared fabric connecting [`MemoryTransport`]s by socket address.
#[derive(Default)]
pub struct MemoryNetwork {
    listeners: Mutex<HashMap<SocketAddr, (NodeId, Inbox)>>,
}

impl MemoryNetwork {
    /// Create an empty network.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Transport for a node with identity `id` whose own address is
    /// `addr` (used as the observed remote address of its dials).
    pub fn transport(self: &Arc<Self>, id: NodeId, addr: SocketAddr) -> MemoryTransport {
        MemoryTransport {
            network: Arc::clone(self),
            id,
            addr,
        }
    }

    /// Stop accepting on `addr`.
    pub fn unlisten(&self, addr: &SocketAddr) {
        self.listeners.lock().remove(addr);
    }
}

/// [`Transport`] over a [`MemoryNetwork`]. Handshakes are instantaneous.
#[derive(Clone)]
pub struct MemoryTransport {
    network: Arc<MemoryNetwork>,
    id: NodeId,
    addr: SocketAddr,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn listen(&self, addr: SocketAddr) -> Result<Box<dyn Listener>, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut listeners = self.network.listeners.lock();
        if listeners.contains_key(&addr) {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                format!("{addr} already bound"),
            )));
        }
        listeners.insert(addr, (self.id, tx));
        Ok(Box::new(MemoryListener { addr, rx }))
    }

    async fn dial(&self, addr: &PeerAddress) -> Result<Box<dyn PeerConnection>, TransportError> {
        let target = addr.socket_addr();
        let (remote_id, inbox) = self
            .network
            .listeners
            .lock()
            .get(&target)
            .map(|(id, inbox)| (*id, inbox.clone()))
            .ok_or_else(|| TransportError::Refused(target.to_string()))?;

        if remote_id != addr.id {
            return Err(TransportError::IdentityMismatch {
                expected: addr.id.to_string(),
                actual: remote_id.to_string(),
            });
        }

        let (ours, theirs) = MemoryConnection::pair(
            (self.id, self.addr, Some(PeerAddress::from_socket_addr(self.id, self.addr))),
            (remote_id, target, Some(*addr)),
        );
        inbox
            .send(Box::new(theirs))
            .map_err(|_| TransportError::Refused(target.to_string()))?;
        Ok(Box::new(ours))
    }
}

struct MemoryListener {
    addr: SocketAddr,
    rx: mpsc::UnboundedReceiver<Box<dyn PeerConnection>>,
}

#[async_trait]
impl Listener for MemoryListener {
    fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    async fn accept(&mut self) -> Result<Box<dyn PeerConnection>, TransportError> {
        self.rx.recv().await.ok_or(TransportError::Closed)
    }
}

/// One end of an in-memory connection.
pub struct MemoryConnection {
    remote_id: NodeId,
    remote_addr: SocketAddr,
    listen_addr: Option<PeerAddress>,
    tx: Option<mpsc::UnboundedSender<PexMessage>>,
    rx: mpsc::UnboundedReceiver<PexMessage>,
}

type Endpoint = (NodeId, SocketAddr, Option<PeerAddress>);

impl MemoryConnection {
    /// Two connected ends; `a` is the dialer, `b` the listener.
    pub fn pair(a: Endpoint, b: Endpoint) -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        let a_end = Self {
            remote_id: b.0,
            remote_addr: b.1,
            listen_addr: b.2,
            tx: Some(a_tx),
            rx: a_rx,
        };
        let b_end = Self {
            remote_id: a.0,
            remote_addr: a.1,
            listen_addr: a.2,
            tx: Some(b_tx),
            rx: b_rx,
        };
        (a_end, b_end)
    }
}

#[async_trait]
impl PeerConnection for MemoryConnection {
    fn remote_id(&self) -> NodeId {
        self.remote_id
    }

    fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    fn listen_addr(&self) -> Option<PeerAddress> {
        self.listen_addr
    }

    async fn send(&mut self, msg: PexMessage) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(msg).map_err(|_| TransportError::Closed)
    }

    async fn receive(&mut self) -> Result<Option<PexMessage>, TransportError> {
        Ok(self.rx.recv().await)
    }

    async fn close(&mut self) {
        self.tx = None;
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controllable_time_source() {
        let time = ControllableTimeSource::new(1000);
        let shared = time.clone();
        shared.advance(5);
        assert_eq!(time.now().as_secs(), 1005);
        time.set(10);
        assert_eq!(shared.now().as_secs(), 10);
    }

    #[tokio::test]
    async fn test_memory_transport_round_trip() {
        let network = MemoryNetwork::new();
        let server_addr: SocketAddr = "8.8.8.8:26656".parse().unwrap();
        let client_addr: SocketAddr = "9.9.9.9:26656".parse().unwrap();
        let server = network.transport(node_id(1), server_addr);
        let client = network.transport(node_id(2), client_addr);

        let mut listener = server.listen(server_addr).await.unwrap();
        let target = PeerAddress::from_socket_addr(node_id(1), server_addr);
        let mut outbound = client.dial(&target).await.unwrap();
        let mut inbound = listener.accept().await.unwrap();

        assert_eq!(inbound.remote_id(), node_id(2));
        assert_eq!(outbound.remote_id(), node_id(1));

        outbound.send(PexMessage::AddrRequest).await.unwrap();
        assert_eq!(inbound.receive().await.unwrap(), Some(PexMessage::AddrRequest));

        outbound.close().await;
        assert_eq!(inbound.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_dial_checks_identity() {
        let network = MemoryNetwork::new();
        let server_addr: SocketAddr = "8.8.8.8:26656".parse().unwrap();
        let server = network.transport(node_id(1), server_addr);
        let _listener = server.listen(server_addr).await.unwrap();

        let client = network.transport(node_id(2), "9.9.9.9:1".parse().unwrap());
        let wrong = PeerAddress::from_socket_addr(node_id(3), server_addr);
        assert!(matches!(
            client.dial(&wrong).await,
            Err(TransportError::IdentityMismatch { .. })
        ));
        let nowhere = PeerAddress::from_socket_addr(node_id(1), "7.7.7.7:1".parse().unwrap());
        assert!(matches!(client.dial(&nowhere).await, Err(TransportError::Refused(_))));
    }
}
