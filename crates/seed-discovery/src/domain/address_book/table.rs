//! Address table implementation.

use std::collections::HashMap;

use super::bucket::AddressBucket;
use super::security::GroupKey;
use super::types::AddrBookEntry;
use crate::domain::NodeId;

/// A table of buckets (either new or vetted)
#[derive(Debug)]
pub struct AddressTable {
    pub(crate) buckets: Vec<AddressBucket>,
    /// Total entries per address group across all buckets
    pub(crate) subnet_totals: HashMap<GroupKey, usize>,
    /// Quick lookup: NodeId -> bucket index
    pub(crate) node_to_bucket: HashMap<NodeId, usize>,
}

impl AddressTable {
    /// Create a new table with specified bucket count
    pub fn new(bucket_count: usize) -> Self {
        Self {
            buckets: (0..bucket_count).map(|_| AddressBucket::new()).collect(),
            subnet_totals: HashMap::new(),
            node_to_bucket: HashMap::new(),
        }
    }

    /// Get total entry count
    pub fn len(&self) -> usize {
        self.node_to_bucket.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.node_to_bucket.is_empty()
    }

    /// Number of buckets
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Check if table contains a node
    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.node_to_bucket.contains_key(node_id)
    }

    /// Entries of the given address group across the table
    pub fn subnet_total(&self, group: &GroupKey) -> usize {
        self.subnet_totals.get(group).copied().unwrap_or(0)
    }

    /// Bucket at `index`
    pub fn bucket(&self, index: usize) -> &AddressBucket {
        &self.buckets[index]
    }

    /// Insert an entry into bucket `index`. The caller checks capacity.
    pub fn insert(&mut self, index: usize, entry: AddrBookEntry) {
        *self.subnet_totals.entry(entry.group()).or_insert(0) += 1;
        self.node_to_bucket.insert(entry.addr.id, index);
        self.buckets[index].add(entry);
    }

    /// Remove an entry wherever it lives
    pub fn remove(&mut self, node_id: &NodeId) -> Option<AddrBookEntry> {
        let index = self.node_to_bucket.remove(node_id)?;
        let entry = self.buckets[index].remove(node_id)?;
        let group = entry.group();
        if let Some(count) = self.subnet_totals.get_mut(&group) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.subnet_totals.remove(&group);
            }
        }
        Some(entry)
    }

    /// Get an entry by NodeId
    pub fn get(&self, node_id: &NodeId) -> Option<&AddrBookEntry> {
        let index = *self.node_to_bucket.get(node_id)?;
        self.buckets[index].get(node_id)
    }

    /// Get a mutable entry by NodeId
    pub fn get_mut(&mut self, node_id: &NodeId) -> Option<&mut AddrBookEntry> {
        let index = *self.node_to_bucket.get(node_id)?;
        self.buckets[index].get_mut(node_id)
    }

    /// Iterate over every entry
    pub fn iter(&self) -> impl Iterator<Item = &AddrBookEntry> {
        self.buckets.iter().flat_map(|b| b.entries().iter())
    }
}
