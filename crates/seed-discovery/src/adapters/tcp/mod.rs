//! # TCP Transport
//!
//! Framed, handshaken TCP connections.
//!
//! ## Wire Format
//!
//! Every frame is a 4-byte big-endian length followed by a bincode body.
//! The first frame in each direction is the sender's [`NodeInfo`]; every
//! later frame is a [`Packet`] tagged with a channel byte. Address
//! exchange runs on channel `0x00`; packets on other channels are dropped.

mod codec;
mod connection;
mod handshake;
mod transport;

pub use codec::{read_frame, write_frame, Packet, DEFAULT_MAX_FRAME_SIZE};
pub use connection::TcpConnection;
pub use handshake::NodeInfo;
pub use transport::{TcpTransport, TcpTransportConfig};
