//! Address book type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::security::GroupKey;
use crate::domain::{PeerAddress, Timestamp};

/// Table an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketType {
    /// Heard about, never exchanged with successfully.
    New,
    /// Completed at least one successful exchange.
    Vetted,
}

/// One address in the book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddrBookEntry {
    /// The peer's address.
    pub addr: PeerAddress,
    /// The peer that reported it.
    pub src: PeerAddress,
    /// Table the entry lives in.
    pub bucket_type: BucketType,
    /// Bucket index within that table.
    pub bucket: usize,
    /// Last time the address was reported or confirmed.
    pub last_seen: Timestamp,
    /// Last dial attempt.
    pub last_attempt: Option<Timestamp>,
    /// Last successful exchange.
    pub last_success: Option<Timestamp>,
    /// Consecutive failed attempts.
    pub failures: u32,
    /// Random tie-break key for eviction ordering.
    pub tie_break: u64,
}

impl AddrBookEntry {
    /// Create a fresh entry in the new table.
    pub fn new(addr: PeerAddress, src: PeerAddress, now: Timestamp, tie_break: u64) -> Self {
        Self {
            addr,
            src,
            bucket_type: BucketType::New,
            bucket: 0,
            last_seen: now,
            last_attempt: None,
            last_success: None,
            failures: 0,
            tie_break,
        }
    }

    /// Address group of the entry.
    pub fn group(&self) -> GroupKey {
        GroupKey::from_ip(&self.addr.ip)
    }

    /// Address group of the reporting source.
    pub fn source_group(&self) -> GroupKey {
        GroupKey::from_ip(&self.src.ip)
    }

    /// Whether the entry has reached the failure threshold.
    pub fn is_bad(&self, max_failures: u32) -> bool {
        self.failures >= max_failures
    }

    /// Whether the entry was attempted within `cooldown_secs` of `now`.
    pub fn recently_attempted(&self, now: Timestamp, cooldown_secs: u64) -> bool {
        self.last_attempt
            .is_some_and(|t| now.secs_since(t) < cooldown_secs)
    }
}

/// Why an address was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The address is our own identity.
    OwnAddress,
    /// Unspecified IP or zero port.
    InvalidAddress,
    /// Non-routable address in strict mode.
    Unroutable,
    /// Too many entries from the address's subnet group.
    SubnetLimit,
    /// The target bucket is full and the newcomer lost the eviction draw.
    BucketFull,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OwnAddress => write!(f, "own address"),
            Self::InvalidAddress => write!(f, "invalid address"),
            Self::Unroutable => write!(f, "unroutable address"),
            Self::SubnetLimit => write!(f, "subnet limit reached"),
            Self::BucketFull => write!(f, "bucket full"),
        }
    }
}

/// Result of [`AddressBook::add_address`](super::AddressBook::add_address).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Stored as a new entry.
    Added,
    /// The identity is already in the book.
    Duplicate,
    /// Not admitted.
    Rejected(RejectReason),
}

/// Statistics about the address book.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressBookStats {
    /// Number of addresses in the new table.
    pub new_count: usize,
    /// Number of addresses in the vetted table.
    pub vetted_count: usize,
    /// Number of buckets in the new table.
    pub new_bucket_count: usize,
    /// Number of buckets in the vetted table.
    pub vetted_bucket_count: usize,
}
