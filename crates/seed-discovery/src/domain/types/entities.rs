//! Core domain entities for peer discovery.

use std::fmt;
use std::hash::Hash;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::errors::AddressParseError;

/// Length of a node identifier in bytes.
pub const NODE_ID_LEN: usize = 20;

/// 160-bit node identifier derived from the node's public key.
///
/// Rendered as 40 lowercase hex characters, both in logs and on disk.
///
/// # Security (Timing Attack Prevention)
///
/// Comparison runs in constant time; the derived byte-wise comparison
/// short-circuits on the first difference.
// The manual PartialEq is constant-time; hashing the raw bytes stays
// consistent with it because equal ids have equal bytes.
#[allow(clippy::derived_hash_with_manual_eq)]
#[derive(Clone, Copy, Hash)]
pub struct NodeId(pub [u8; NODE_ID_LEN]);

impl PartialEq for NodeId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        let mut result = 0u8;
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            result |= a ^ b;
        }
        result == 0
    }
}

impl Eq for NodeId {}

impl NodeId {
    /// Create a NodeId from raw bytes.
    pub fn new(bytes: [u8; NODE_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; NODE_ID_LEN] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl AsRef<[u8]> for NodeId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.to_hex())
    }
}

impl FromStr for NodeId {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| AddressParseError::InvalidId(s.to_string()))?;
        let bytes: [u8; NODE_ID_LEN] = bytes
            .try_into()
            .map_err(|_| AddressParseError::InvalidId(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Network address of a candidate peer: identity plus dialable endpoint.
///
/// Text form is `id@ip:port` (IPv6 in brackets). An address is only
/// usable when the IP is specified and the port is non-zero; see
/// [`PeerAddress::is_valid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddress {
    /// Identity the peer is expected to present.
    pub id: NodeId,
    /// IP address (v4 or v6).
    pub ip: IpAddr,
    /// Port number.
    pub port: u16,
}

impl PeerAddress {
    /// Create a new peer address.
    pub fn new(id: NodeId, ip: IpAddr, port: u16) -> Self {
        Self { id, ip, port }
    }

    /// Build from an identity and a socket address.
    pub fn from_socket_addr(id: NodeId, addr: SocketAddr) -> Self {
        Self::new(id, addr.ip(), addr.port())
    }

    /// Socket address to dial.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// Well-formed: specified IP and non-zero port.
    pub fn is_valid(&self) -> bool {
        !self.ip.is_unspecified() && self.port != 0
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.socket_addr())
    }
}

impl FromStr for PeerAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, endpoint) = split_id(s)?;
        let addr: SocketAddr = endpoint
            .parse()
            .map_err(|_| AddressParseError::InvalidEndpoint(endpoint.to_string()))?;
        Ok(Self::from_socket_addr(id, addr))
    }
}

/// Bootstrap seed from configuration: `id@host:port`, where host may be a
/// DNS name that is resolved only when the seed is dialed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeedAddress {
    /// Identity the seed must present.
    pub id: NodeId,
    /// Hostname or IP literal.
    pub host: String,
    /// Port number.
    pub port: u16,
}

impl SeedAddress {
    /// Create a new seed address.
    pub fn new(id: NodeId, host: impl Into<String>, port: u16) -> Self {
        Self {
            id,
            host: host.into(),
            port,
        }
    }

    /// The seed as a peer address when its host is an IP literal.
    pub fn as_peer_address(&self) -> Option<PeerAddress> {
        let ip = self
            .host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .ok()?;
        Some(PeerAddress::new(self.id, ip, self.port))
    }

    /// Parse a comma-separated seed list. Items are trimmed and empty items
    /// skipped; malformed items are returned separately so the caller can
    /// report them.
    pub fn parse_list(list: &str) -> (Vec<SeedAddress>, Vec<AddressParseError>) {
        let mut seeds = Vec::new();
        let mut errors = Vec::new();
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match item.parse() {
                Ok(seed) => seeds.push(seed),
                Err(e) => errors.push(e),
            }
        }
        (seeds, errors)
    }
}

impl fmt::Display for SeedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.id, self.host, self.port)
    }
}

impl FromStr for SeedAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, endpoint) = split_id(s)?;
        let (host, port) = endpoint
            .rsplit_once(':')
            .ok_or_else(|| AddressParseError::InvalidEndpoint(endpoint.to_string()))?;
        let port: u16 = port
            .parse()
            .map_err(|_| AddressParseError::InvalidEndpoint(endpoint.to_string()))?;
        if host.is_empty() || port == 0 {
            return Err(AddressParseError::InvalidEndpoint(endpoint.to_string()));
        }
        Ok(Self::new(id, host, port))
    }
}

fn split_id(s: &str) -> Result<(NodeId, &str), AddressParseError> {
    let (id, endpoint) = s
        .split_once('@')
        .ok_or_else(|| AddressParseError::MissingId(s.to_string()))?;
    Ok((id.parse()?, endpoint))
}

/// Unix timestamp in seconds.
///
/// Clamped to a reasonable maximum so that hostile or corrupt values
/// cannot overflow age arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Maximum reasonable timestamp (year 9999).
    pub const MAX_REASONABLE: u64 = 253_402_300_799;

    /// Create a new timestamp, clamping to MAX_REASONABLE.
    pub fn new(secs: u64) -> Self {
        Self(secs.min(Self::MAX_REASONABLE))
    }

    /// Get the underlying seconds value.
    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Add seconds to timestamp (saturating at MAX_REASONABLE).
    pub fn add_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs).min(Self::MAX_REASONABLE))
    }

    /// Subtract seconds from timestamp (saturating at 0).
    pub fn sub_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_sub(secs))
    }

    /// Seconds elapsed from `earlier` to `self`, zero if `earlier` is later.
    pub fn secs_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}
