//! Connection slots types.

use std::fmt;
use std::net::SocketAddr;

use tokio::time::Instant;

use crate::domain::{NodeId, PeerAddress};

/// Direction of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionDirection {
    /// We initiated this connection
    Outbound,
    /// Peer initiated this connection
    Inbound,
}

impl fmt::Display for ConnectionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Outbound => write!(f, "outbound"),
            Self::Inbound => write!(f, "inbound"),
        }
    }
}

/// Why admission control refused a connection or dial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRejection {
    /// The remote identity is our own
    SelfConnection,
    /// Already connected to (or dialing) this identity
    DuplicateId,
    /// Already connected to this IP and duplicates are disallowed
    DuplicateIp,
    /// Inbound cap reached
    InboundFull,
    /// Outbound cap reached
    OutboundFull,
}

impl fmt::Display for SlotRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfConnection => write!(f, "self connection"),
            Self::DuplicateId => write!(f, "duplicate id"),
            Self::DuplicateIp => write!(f, "duplicate ip"),
            Self::InboundFull => write!(f, "inbound slots full"),
            Self::OutboundFull => write!(f, "outbound slots full"),
        }
    }
}

/// Result of trying to admit a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptResult {
    /// Connection registered
    Accepted,
    /// Connection refused
    Rejected(SlotRejection),
}

/// A live connection as tracked by the switch.
#[derive(Debug, Clone)]
pub struct ConnectionRecord<H> {
    /// Remote identity
    pub id: NodeId,
    /// Who initiated the connection
    pub direction: ConnectionDirection,
    /// Observed remote socket address
    pub remote_addr: SocketAddr,
    /// Address the peer accepts connections on, if known
    pub listen_addr: Option<PeerAddress>,
    /// When the connection was registered
    pub connected_at: Instant,
    /// Control handle to the connection's worker
    pub handle: H,
}

/// Connection statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Current number of outbound connections.
    pub outbound_count: usize,
    /// Current number of inbound connections.
    pub inbound_count: usize,
    /// Dials in flight.
    pub dialing_count: usize,
    /// Maximum outbound connections allowed.
    pub max_outbound: usize,
    /// Maximum inbound connections allowed.
    pub max_inbound: usize,
}
