//! Domain Layer - Pure business logic with no I/O
//!
//! - Node identities and peer addresses
//! - Address Book (new/vetted bucket system)
//! - Peer Exchange engine (request/response state machine, churn policy)
//! - Connection Slots (inbound/outbound caps, dial reservations)

pub mod address_book;
pub mod connection_slots;
pub mod pex;
/// Core domain types (entities, errors)
pub mod types;

pub use address_book::*;
pub use connection_slots::*;
pub use pex::*;
pub use types::*;
