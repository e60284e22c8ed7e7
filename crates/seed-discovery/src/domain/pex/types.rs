//! Peer exchange engine inputs and outputs.

use std::fmt;
use std::net::SocketAddr;

use tokio::time::Instant;

use super::messages::PexMessage;
use crate::domain::{ConnectionDirection, DisconnectReason, NodeId, PeerAddress, SeedAddress};

/// Something the crawl loop should dial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialTarget {
    /// An address picked from the book.
    Book(PeerAddress),
    /// A configured bootstrap seed.
    Seed(SeedAddress),
}

impl DialTarget {
    /// Identity the target must present.
    pub fn id(&self) -> NodeId {
        match self {
            DialTarget::Book(addr) => addr.id,
            DialTarget::Seed(seed) => seed.id,
        }
    }
}

impl fmt::Display for DialTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialTarget::Book(addr) => write!(f, "{addr}"),
            DialTarget::Seed(seed) => write!(f, "{seed}"),
        }
    }
}

/// What the engine knows about a connection that just came up.
#[derive(Debug, Clone)]
pub struct PeerContext {
    /// Remote identity.
    pub id: NodeId,
    /// Who initiated the connection.
    pub direction: ConnectionDirection,
    /// Observed remote socket address.
    pub remote_addr: SocketAddr,
    /// Outbound: the address we dialed. Inbound: the listen address the
    /// peer advertised, if any.
    pub address: Option<PeerAddress>,
}

impl PeerContext {
    /// Address to record as the source of what this peer reports.
    pub fn source(&self) -> PeerAddress {
        self.address
            .unwrap_or_else(|| PeerAddress::from_socket_addr(self.id, self.remote_addr))
    }
}

/// Work for the connection worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PexAction {
    /// Send a message on the connection.
    Send(PexMessage),
    /// Close the connection.
    Disconnect(DisconnectReason),
}

/// Engine decisions for a connection that just came up.
#[derive(Debug, Clone, Default)]
pub struct PeerUpPlan {
    /// Messages to send right away.
    pub actions: Vec<PexAction>,
    /// When our request counts as timed out.
    pub request_deadline: Option<Instant>,
    /// When the connection is force-closed.
    pub churn_deadline: Option<Instant>,
}
