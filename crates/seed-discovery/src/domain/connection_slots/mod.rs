//! # Connection Slots Management
//!
//! Registry of live connections with independent inbound and outbound caps.
//!
//! - **Outbound slots**: filled by our own dials; a dial reserves its slot
//!   before the transport connects
//! - **Inbound slots**: filled by peers dialing us; over the cap a
//!   connection is refused rather than displacing anyone

mod config;
mod manager;
mod types;

pub use config::ConnectionSlotsConfig;
pub use manager::ConnectionSlots;
pub use types::{AcceptResult, ConnectionDirection, ConnectionRecord, ConnectionStats, SlotRejection};

#[cfg(test)]
mod tests;
