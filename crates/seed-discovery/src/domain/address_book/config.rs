//! Address book configuration.

use std::path::PathBuf;

use crate::domain::AddressBookError;

/// Configuration for the address book
#[derive(Debug, Clone)]
pub struct AddressBookConfig {
    /// File the book is saved to and loaded from; `None` keeps it in memory
    pub file_path: Option<PathBuf>,
    /// Reject non-routable addresses (private, loopback, reserved ranges)
    pub strict_routing: bool,
    /// Number of buckets in the new table
    pub new_bucket_count: usize,
    /// Number of buckets in the vetted table
    pub vetted_bucket_count: usize,
    /// Maximum entries per bucket
    pub bucket_size: usize,
    /// Distinct new buckets a single source group can reach
    pub new_buckets_per_source_group: u64,
    /// Distinct vetted buckets a single address group can reach
    pub vetted_buckets_per_group: u64,
    /// Maximum entries from the same address group per bucket
    pub max_per_subnet_per_bucket: usize,
    /// Maximum entries from the same address group across the book
    pub max_per_subnet_total: usize,
    /// Consecutive failures after which an entry is demoted or evicted
    pub max_failures: u32,
    /// A bucket victim unseen for this long always loses to a newcomer
    pub eviction_min_age_secs: u64,
    /// Entries attempted within this window are not picked again
    pub attempt_cooldown_secs: u64,
    /// Below this size the book asks peers for more addresses
    pub need_address_threshold: usize,
}

impl Default for AddressBookConfig {
    fn default() -> Self {
        Self {
            file_path: None,
            strict_routing: true,
            new_bucket_count: 256,
            vetted_bucket_count: 64,
            bucket_size: 64,
            new_buckets_per_source_group: 64,
            vetted_buckets_per_group: 8,
            max_per_subnet_per_bucket: 16,
            max_per_subnet_total: 256,
            max_failures: 3,
            eviction_min_age_secs: 3600,
            attempt_cooldown_secs: 30,
            need_address_threshold: 1000,
        }
    }
}

impl AddressBookConfig {
    /// Reject table dimensions the bucketing cannot work with.
    pub fn validate(&self) -> Result<(), AddressBookError> {
        let dimensions = [
            ("new_bucket_count", self.new_bucket_count),
            ("vetted_bucket_count", self.vetted_bucket_count),
            ("bucket_size", self.bucket_size),
        ];
        match dimensions.iter().find(|(_, value)| *value == 0) {
            Some((name, _)) => Err(AddressBookError::InvalidConfig(name)),
            None => Ok(()),
        }
    }

    /// Small tables for tests, permissive routing
    pub fn for_testing() -> Self {
        Self {
            file_path: None,
            strict_routing: false,
            new_bucket_count: 8,
            vetted_bucket_count: 4,
            bucket_size: 4,
            new_buckets_per_source_group: 4,
            vetted_buckets_per_group: 2,
            max_per_subnet_per_bucket: 4,
            max_per_subnet_total: 16,
            max_failures: 3,
            eviction_min_age_secs: 3600,
            attempt_cooldown_secs: 30,
            need_address_threshold: 1000,
        }
    }

    /// Total entries the book can hold
    pub fn capacity(&self) -> usize {
        (self.new_bucket_count + self.vetted_bucket_count) * self.bucket_size
    }
}
