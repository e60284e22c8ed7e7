//! Per-connection exchange state.

use tokio::time::Instant;

use crate::domain::{ConnectionDirection, PeerAddress};

/// Exchange state for one live connection.
///
/// Requester side: `Idle -> RequestSent -> (AddressesReceived | Timeout)`.
/// Responder side: `Idle -> RequestReceived -> AddressesSent`. Both run
/// concurrently on the same connection.
#[derive(Debug, Clone)]
pub struct PexSession {
    /// Who initiated the connection.
    pub direction: ConnectionDirection,
    /// Source recorded for addresses this peer reports.
    pub source: PeerAddress,
    /// When we last asked this peer for addresses.
    pub last_request_sent: Option<Instant>,
    /// When this peer last asked us.
    pub last_request_received: Option<Instant>,
    /// Our request is outstanding.
    pub awaiting_response: bool,
    /// This peer answered our request.
    pub response_received: bool,
    /// We answered this peer's request.
    pub served: bool,
    /// A failed attempt was already charged to this peer.
    pub failure_recorded: bool,
}

impl PexSession {
    /// Fresh session for a connection that just came up.
    pub fn new(direction: ConnectionDirection, source: PeerAddress) -> Self {
        Self {
            direction,
            source,
            last_request_sent: None,
            last_request_received: None,
            awaiting_response: false,
            response_received: false,
            served: false,
            failure_recorded: false,
        }
    }

    /// Record that we sent a request.
    pub fn request_sent(&mut self, now: Instant) {
        self.last_request_sent = Some(now);
        self.awaiting_response = true;
    }

    /// Seed mode: whether this connection has done its job.
    ///
    /// Outbound connections are done once the peer answered us. Inbound
    /// connections are done once we served them and our own request is
    /// settled.
    pub fn exchange_complete(&self) -> bool {
        match self.direction {
            ConnectionDirection::Outbound => self.response_received,
            ConnectionDirection::Inbound => self.served && !self.awaiting_response,
        }
    }
}
