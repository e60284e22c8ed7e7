//! # Driven Ports (Outbound SPI)
//!
//! These are the interfaces this subsystem **requires** the host application
//! to implement: clocks, randomness and the framed connection transport.

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::domain::{NodeId, PeerAddress, PexMessage, Timestamp, TransportError};

/// Abstract interface for wall-clock time.
///
/// Enables deterministic testing by injecting controllable time sources.
/// Production implementations use system time.
pub trait TimeSource: Send + Sync {
    /// Get the current timestamp.
    fn now(&self) -> Timestamp;
}

/// Abstract interface for randomness.
///
/// Address selection and bucket keys draw from this port so tests can use
/// a seeded generator.
pub trait RandomSource: Send + Sync {
    /// Uniform integer in `0..max`. Returns 0 when `max` is 0.
    fn random_usize(&self, max: usize) -> usize;

    /// Uniform float in `[0, 1)`.
    fn random_f64(&self) -> f64;

    /// Fill `dest` with random bytes.
    fn fill_bytes(&self, dest: &mut [u8]);
}

/// Fisher-Yates shuffle driven by a [`RandomSource`].
pub fn shuffle<T>(rng: &dyn RandomSource, items: &mut [T]) {
    for i in (1..items.len()).rev() {
        let j = rng.random_usize(i + 1);
        items.swap(i, j);
    }
}

/// An established, handshaken connection to one peer.
///
/// # Cancel Safety
///
/// `receive` must be cancel-safe: the switch polls it inside `select!`
/// alongside timers and control commands.
#[async_trait]
pub trait PeerConnection: Send {
    /// Identity the peer presented during the handshake.
    fn remote_id(&self) -> NodeId;

    /// Observed remote socket address.
    fn remote_addr(&self) -> SocketAddr;

    /// Address the peer says it accepts connections on, if any.
    fn listen_addr(&self) -> Option<PeerAddress>;

    /// Send one exchange message.
    async fn send(&mut self, msg: PexMessage) -> Result<(), TransportError>;

    /// Next exchange message; `Ok(None)` once the remote has closed.
    async fn receive(&mut self) -> Result<Option<PexMessage>, TransportError>;

    /// Close the connection. Idempotent.
    async fn close(&mut self);
}

/// A bound listener yielding handshaken inbound connections.
#[async_trait]
pub trait Listener: Send {
    /// Address actually bound.
    fn local_addr(&self) -> SocketAddr;

    /// Next inbound connection. Handshakes run concurrently behind this
    /// call; a slow peer never blocks the next accept.
    async fn accept(&mut self) -> Result<Box<dyn PeerConnection>, TransportError>;
}

/// The framed, multiplexed connection layer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Bind `addr` and start accepting.
    async fn listen(&self, addr: SocketAddr) -> Result<Box<dyn Listener>, TransportError>;

    /// Open an outbound connection and complete the handshake. The remote
    /// must present `addr.id`.
    async fn dial(&self, addr: &PeerAddress) -> Result<Box<dyn PeerConnection>, TransportError>;
}
