//! Peer exchange wire messages.

use serde::{Deserialize, Serialize};

use crate::domain::PeerAddress;

/// Channel byte the exchange protocol is multiplexed on.
pub const PEX_CHANNEL: u8 = 0x00;

/// Messages of the address exchange protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PexMessage {
    /// Ask the peer for addresses it knows.
    AddrRequest,
    /// Addresses sent in reply to a request.
    AddrResponse {
        /// Reported addresses.
        addrs: Vec<PeerAddress>,
    },
}

impl PexMessage {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PexMessage::AddrRequest => "addr_request",
            PexMessage::AddrResponse { .. } => "addr_response",
        }
    }
}
