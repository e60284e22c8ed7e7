//! # Adapters
//!
//! Concrete implementations of the driven ports.
//!
//! - `SystemTimeSource` - wall clock
//! - `OsRandomSource` / `SeededRandomSource` - randomness
//! - `TcpTransport` - framed TCP connections (requires "tcp" feature)

/// Random source adapters
pub mod random;
/// Time source adapters
pub mod time;

/// TCP transport
#[cfg(feature = "tcp")]
pub mod tcp;

pub use random::{OsRandomSource, SeededRandomSource};
pub use time::SystemTimeSource;

#[cfg(feature = "tcp")]
pub use tcp::{NodeInfo, TcpTransport, TcpTransportConfig};
