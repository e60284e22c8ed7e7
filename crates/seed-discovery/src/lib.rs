//! # Seed Discovery
//!
//! Address book, peer exchange (PEX) and connection switch of the TinySeed
//! seed node.
//!
//! A seed node crawls the network: it dials addresses from its book, asks
//! every peer for the addresses it knows, serves its own book in return and
//! then hangs up to make room for the next peer.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture with:
//! - **Domain Layer:** Address book buckets, PEX state machine, connection slots
//! - **Ports Layer:** Time, randomness, transport and dialer traits
//! - **Service Layer:** Switch (listener, dialer, connection workers) and crawler
//! - **Adapters Layer:** System clock, RNGs, TCP transport (feature-gated)
//!
//! ## Example
//!
//! ```rust
//! use std::collections::HashSet;
//! use std::sync::Arc;
//!
//! use seed_discovery::adapters::{SeededRandomSource, SystemTimeSource};
//! use seed_discovery::{AddOutcome, AddressBook, AddressBookConfig, NodeId, PeerAddress};
//!
//! let own_id = NodeId::new([0u8; 20]);
//! let config = AddressBookConfig { strict_routing: false, ..AddressBookConfig::default() };
//! let book = AddressBook::new(
//!     own_id,
//!     config,
//!     Arc::new(SystemTimeSource::new()),
//!     Arc::new(SeededRandomSource::new(1)),
//! )
//! .unwrap();
//!
//! let peer: PeerAddress = "0101010101010101010101010101010101010101@192.168.1.10:26656"
//!     .parse()
//!     .unwrap();
//! assert_eq!(book.add_address(peer, peer), AddOutcome::Added);
//! assert_eq!(book.pick_address(&HashSet::new()), Some(peer));
//! ```

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

/// Test utilities (ControllableTimeSource, in-memory transport)
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// =============================================================================
// RE-EXPORTS
// =============================================================================

// Domain entities
pub use domain::{
    AddressBookError, AddressParseError, DisconnectReason, NodeId, PeerAddress, PexError,
    SeedAddress, SwitchError, Timestamp, TransportError, NODE_ID_LEN,
};

// Address book
pub use domain::{
    AddOutcome, AddrBookEntry, AddressBook, AddressBookConfig, AddressBookStats, BucketType,
    GroupKey, RejectReason,
};

// Peer exchange and connection slots
pub use domain::{
    ConnectionDirection, ConnectionSlotsConfig, ConnectionStats, DialTarget, PexConfig, PexEngine,
    PexMessage, PEX_CHANNEL,
};

// Port traits
pub use ports::{Dialer, Listener, PeerConnection, RandomSource, TimeSource, Transport};

// Services
pub use service::{Crawler, Switch, SwitchConfig};

#[cfg(feature = "tcp")]
pub use adapters::{NodeInfo, TcpTransport, TcpTransportConfig};
