//! Domain errors for peer discovery.

use std::fmt;

use thiserror::Error;

/// Errors parsing `id@host:port` strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    /// No `id@` prefix.
    #[error("address {0:?} is missing the id@ prefix")]
    MissingId(String),
    /// The id is not 40 hex characters.
    #[error("invalid node id {0:?}")]
    InvalidId(String),
    /// The host:port part could not be parsed.
    #[error("invalid endpoint {0:?}")]
    InvalidEndpoint(String),
}

/// Errors from address book persistence.
#[derive(Debug, Error)]
pub enum AddressBookError {
    /// Reading or writing the book file failed.
    #[error("address book I/O error on {path}: {source}")]
    Io {
        /// File involved.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The book could not be encoded.
    #[error("address book encoding error: {0}")]
    Encode(#[from] serde_json::Error),
    /// A table dimension is unusable.
    #[error("invalid address book config: {0} must be nonzero")]
    InvalidConfig(&'static str),
}

/// Protocol faults raised by a single peer exchange. Each one closes the
/// offending connection only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PexError {
    /// An address response arrived without an outstanding request.
    #[error("unsolicited address response")]
    UnsolicitedResponse,
    /// The response carried more addresses than allowed.
    #[error("address response too large: {count} addresses, max {max}")]
    OversizedResponse {
        /// Addresses received.
        count: usize,
        /// Configured bound.
        max: usize,
    },
    /// The response contained an unusable address.
    #[error("malformed address in response: {0}")]
    MalformedAddress(String),
    /// The session for this peer is unknown.
    #[error("no exchange session for peer")]
    UnknownPeer,
}

/// Errors from the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Operation timed out.
    #[error("timeout: {0}")]
    Timeout(String),
    /// Handshake failed.
    #[error("handshake failed: {0}")]
    Handshake(String),
    /// The remote node belongs to a different network.
    #[error("network mismatch: ours {ours}, theirs {theirs}")]
    NetworkMismatch {
        /// Our network id.
        ours: String,
        /// Their network id.
        theirs: String,
    },
    /// The remote node presented an unexpected identity.
    #[error("identity mismatch: expected {expected}, got {actual}")]
    IdentityMismatch {
        /// Identity we dialed.
        expected: String,
        /// Identity presented.
        actual: String,
    },
    /// Frame exceeds the size bound.
    #[error("frame too large: {size} bytes, max {max} bytes")]
    FrameTooLarge {
        /// Frame size.
        size: usize,
        /// Maximum allowed.
        max: usize,
    },
    /// A frame could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),
    /// Nothing is reachable at the address.
    #[error("connection refused: {0}")]
    Refused(String),
    /// The connection or listener is closed.
    #[error("connection closed")]
    Closed,
}

#[cfg(feature = "tcp")]
impl From<bincode::Error> for TransportError {
    fn from(e: bincode::Error) -> Self {
        TransportError::Codec(e.to_string())
    }
}

/// Errors from the switch.
#[derive(Debug, Error)]
pub enum SwitchError {
    /// Binding the listen address failed.
    #[error("failed to listen on {addr}: {source}")]
    Listen {
        /// Requested listen address.
        addr: String,
        /// Underlying error.
        #[source]
        source: TransportError,
    },
    /// The switch was already started.
    #[error("switch already started")]
    AlreadyStarted,
    /// The dial target is ourselves.
    #[error("refusing to dial self")]
    SelfDial,
    /// Admission control refused the connection.
    #[error("connection rejected: {0}")]
    Rejected(String),
    /// Seed hostname could not be resolved.
    #[error("failed to resolve {host}: {reason}")]
    Resolve {
        /// Hostname.
        host: String,
        /// Failure description.
        reason: String,
    },
    /// Dial failed at the transport level.
    #[error("dial failed: {0}")]
    Dial(#[from] TransportError),
}

/// Reasons why a connection was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectReason {
    /// The remote side closed the connection.
    RemoteClosed,
    /// Closed on local request.
    LocalClose,
    /// Connection outlived the churn grace period.
    ChurnTimeout,
    /// The peer broke the exchange protocol.
    ProtocolViolation,
    /// The address exchange finished (seed mode).
    ExchangeComplete,
    /// Node shutdown.
    Shutdown,
    /// I/O failure during communication.
    NetworkError,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteClosed => write!(f, "remote closed"),
            Self::LocalClose => write!(f, "local close"),
            Self::ChurnTimeout => write!(f, "churn timeout"),
            Self::ProtocolViolation => write!(f, "protocol violation"),
            Self::ExchangeComplete => write!(f, "exchange complete"),
            Self::Shutdown => write!(f, "shutdown"),
            Self::NetworkError => write!(f, "network error"),
        }
    }
}
