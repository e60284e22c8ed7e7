//! # Address Book - New/Vetted Bucket System
//!
//! Persistent, quality-ranked store of peer addresses.
//!
//! ## Design
//!
//! - **New table**: addresses heard about through gossip
//! - **Vetted table**: addresses that completed a successful exchange
//!
//! ## Anti-Eclipse Properties
//!
//! 1. Source-group bucketing bounds how far one reporter can spread
//! 2. Per-group limits prevent flooding from a single IP range
//! 3. Segregation keeps unverified gossip out of the vetted table
//! 4. The bucketing key is secret, random and persisted with the book

mod book;
mod bucket;
mod config;
mod persistence;
mod security;
mod table;
mod types;

// Re-export public API
pub use book::{AddressBook, MAX_GET_SELECTION, NEW_WEIGHT, VETTED_WEIGHT};
pub use bucket::AddressBucket;
pub use config::AddressBookConfig;
pub use security::{is_routable, keyed_bucket_hash, GroupKey};
pub use table::AddressTable;
pub use types::{AddOutcome, AddrBookEntry, AddressBookStats, BucketType, RejectReason};
