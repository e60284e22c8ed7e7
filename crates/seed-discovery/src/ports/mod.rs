//! # Ports Layer - Hexagonal Architecture Boundaries
//!
//! - **Driving Ports (Inbound):** APIs this subsystem exposes to consumers
//! - **Driven Ports (Outbound):** SPIs this subsystem requires from adapters

pub mod inbound;
pub mod outbound;

pub use inbound::Dialer;
pub use outbound::{shuffle, Listener, PeerConnection, RandomSource, TimeSource, Transport};
