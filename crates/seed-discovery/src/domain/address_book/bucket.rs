//! Address bucket implementation.

use std::collections::HashMap;

use super::security::GroupKey;
use super::types::AddrBookEntry;
use crate::domain::NodeId;

/// A bucket of entries with per-group counters
#[derive(Debug, Clone, Default)]
pub struct AddressBucket {
    pub(crate) entries: Vec<AddrBookEntry>,
    /// Entries per address group in this bucket
    pub(crate) subnet_counts: HashMap<GroupKey, usize>,
    /// Entries per source group in this bucket
    pub(crate) source_counts: HashMap<GroupKey, usize>,
}

impl AddressBucket {
    /// Create a new empty bucket
    pub fn new() -> Self {
        Self::default()
    }

    /// Get number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries from the given address group
    pub fn subnet_count(&self, group: &GroupKey) -> usize {
        self.subnet_counts.get(group).copied().unwrap_or(0)
    }

    /// Entries reported by the given source group
    pub fn source_count(&self, group: &GroupKey) -> usize {
        self.source_counts.get(group).copied().unwrap_or(0)
    }

    /// Add an entry to the bucket
    pub fn add(&mut self, entry: AddrBookEntry) {
        *self.subnet_counts.entry(entry.group()).or_insert(0) += 1;
        *self.source_counts.entry(entry.source_group()).or_insert(0) += 1;
        self.entries.push(entry);
    }

    /// Remove an entry by NodeId
    pub fn remove(&mut self, node_id: &NodeId) -> Option<AddrBookEntry> {
        let pos = self.entries.iter().position(|e| &e.addr.id == node_id)?;
        let entry = self.entries.swap_remove(pos);
        decrement(&mut self.subnet_counts, entry.group());
        decrement(&mut self.source_counts, entry.source_group());
        Some(entry)
    }

    /// Get an entry by NodeId
    pub fn get(&self, node_id: &NodeId) -> Option<&AddrBookEntry> {
        self.entries.iter().find(|e| &e.addr.id == node_id)
    }

    /// Get a mutable entry by NodeId
    pub fn get_mut(&mut self, node_id: &NodeId) -> Option<&mut AddrBookEntry> {
        self.entries.iter_mut().find(|e| &e.addr.id == node_id)
    }

    /// Get all entries
    pub fn entries(&self) -> &[AddrBookEntry] {
        &self.entries
    }

    /// First entry at or past the failure threshold
    pub fn first_bad(&self, max_failures: u32) -> Option<NodeId> {
        self.entries
            .iter()
            .find(|e| e.is_bad(max_failures))
            .map(|e| e.addr.id)
    }

    /// Entry with the oldest `last_seen`; ties go to the lower tie-break key
    pub fn oldest(&self) -> Option<&AddrBookEntry> {
        self.entries
            .iter()
            .min_by_key(|e| (e.last_seen, e.tie_break))
    }
}

fn decrement(counts: &mut HashMap<GroupKey, usize>, key: GroupKey) {
    if let Some(count) = counts.get_mut(&key) {
        *count = count.saturating_sub(1);
        if *count == 0 {
            counts.remove(&key);
        }
    }
}
