//! Main AddressBook implementation.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use super::config::AddressBookConfig;
use super::security::{is_routable, keyed_bucket_hash, GroupKey};
use super::table::AddressTable;
use super::types::{AddOutcome, AddrBookEntry, AddressBookStats, BucketType, RejectReason};
use crate::domain::{AddressBookError, NodeId, PeerAddress, Timestamp};
use crate::ports::{shuffle, RandomSource, TimeSource};

/// Weight of a vetted entry relative to a new one in [`AddressBook::pick_address`].
pub const VETTED_WEIGHT: f64 = 3.0;
/// Weight floor of a new entry; never zero so new addresses keep getting tried.
pub const NEW_WEIGHT: f64 = 1.0;
/// Per-failure multiplier applied to selection weight.
const FAILURE_PENALTY: f64 = 0.66;
/// Failures beyond this no longer lower the weight further.
const MAX_PENALIZED_FAILURES: u32 = 8;

/// Serving bounds for one address response.
pub const MAX_GET_SELECTION: usize = 250;
const MIN_GET_SELECTION: usize = 32;
const GET_SELECTION_PERCENT: usize = 23;

/// Buckets and bucketing key, guarded together.
#[derive(Debug)]
pub(crate) struct BookState {
    pub(crate) key: [u8; 32],
    pub(crate) new_table: AddressTable,
    pub(crate) vetted_table: AddressTable,
}

impl BookState {
    pub(crate) fn new(key: [u8; 32], config: &AddressBookConfig) -> Self {
        Self {
            key,
            new_table: AddressTable::new(config.new_bucket_count),
            vetted_table: AddressTable::new(config.vetted_bucket_count),
        }
    }

    pub(crate) fn contains(&self, id: &NodeId) -> bool {
        self.vetted_table.contains(id) || self.new_table.contains(id)
    }

    fn entry(&self, id: &NodeId) -> Option<&AddrBookEntry> {
        self.vetted_table.get(id).or_else(|| self.new_table.get(id))
    }

    fn entry_mut(&mut self, id: &NodeId) -> Option<&mut AddrBookEntry> {
        if self.vetted_table.contains(id) {
            self.vetted_table.get_mut(id)
        } else {
            self.new_table.get_mut(id)
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.new_table.len() + self.vetted_table.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &AddrBookEntry> {
        self.vetted_table.iter().chain(self.new_table.iter())
    }

    pub(crate) fn group_total(&self, group: &GroupKey) -> usize {
        self.new_table.subnet_total(group) + self.vetted_table.subnet_total(group)
    }

    /// New-table bucket for `addr` as reported by `src`.
    ///
    /// # Security
    /// One source group reaches at most `new_buckets_per_source_group`
    /// buckets, so a single network range cannot flood the whole table.
    pub(crate) fn new_bucket_index(
        &self,
        config: &AddressBookConfig,
        addr: &PeerAddress,
        src: &PeerAddress,
    ) -> usize {
        let src_group = GroupKey::from_ip(&src.ip);
        let addr_str = addr.to_string();
        let h1 = keyed_bucket_hash(&self.key, &[addr_str.as_bytes(), &src_group.0])
            % config.new_buckets_per_source_group.max(1);
        let h2 = keyed_bucket_hash(&self.key, &[&src_group.0, &h1.to_be_bytes()]);
        (h2 % config.new_bucket_count as u64) as usize
    }

    /// Vetted-table bucket for `addr`, spread over a bounded number of
    /// buckets per address group.
    pub(crate) fn vetted_bucket_index(&self, config: &AddressBookConfig, addr: &PeerAddress) -> usize {
        let group = GroupKey::from_ip(&addr.ip);
        let addr_str = addr.to_string();
        let h1 = keyed_bucket_hash(&self.key, &[addr_str.as_bytes()])
            % config.vetted_buckets_per_group.max(1);
        let h2 = keyed_bucket_hash(&self.key, &[&group.0, &h1.to_be_bytes()]);
        (h2 % config.vetted_bucket_count as u64) as usize
    }

    /// Move an entry back into the new table. Dropped when its new bucket
    /// has no room.
    fn demote_to_new(&mut self, config: &AddressBookConfig, mut entry: AddrBookEntry) -> bool {
        let index = self.new_bucket_index(config, &entry.addr, &entry.src);
        if self.new_table.bucket(index).len() >= config.bucket_size {
            debug!(peer = %entry.addr, "Dropped demoted address, new bucket full");
            return false;
        }
        entry.bucket_type = BucketType::New;
        entry.bucket = index;
        self.new_table.insert(index, entry);
        true
    }
}

/// Persistent, bucketed store of peer addresses.
///
/// # Anti-Eclipse Defense
///
/// 1. Reported addresses go to the new table, bucketed by source group
/// 2. Only a successful exchange promotes an address to the vetted table
/// 3. Per-group limits stop one network range from filling the book
/// 4. Full buckets evict bad or stale entries, never arbitrary ones
///
/// # Concurrency
///
/// One reader-writer lock guards all buckets. Selection and introspection
/// share it; mutations serialize.
pub struct AddressBook {
    own_id: NodeId,
    pub(crate) config: AddressBookConfig,
    pub(crate) state: RwLock<BookState>,
    time: Arc<dyn TimeSource>,
    rng: Arc<dyn RandomSource>,
}

impl std::fmt::Debug for AddressBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressBook")
            .field("own_id", &self.own_id)
            .field("size", &self.size())
            .finish()
    }
}

impl AddressBook {
    /// Create an empty book with a fresh random bucketing key.
    ///
    /// # Errors
    ///
    /// [`AddressBookError::InvalidConfig`] for a zero bucket count or size.
    pub fn new(
        own_id: NodeId,
        config: AddressBookConfig,
        time: Arc<dyn TimeSource>,
        rng: Arc<dyn RandomSource>,
    ) -> Result<Self, AddressBookError> {
        config.validate()?;
        let mut key = [0u8; 32];
        rng.fill_bytes(&mut key);
        Ok(Self {
            own_id,
            state: RwLock::new(BookState::new(key, &config)),
            config,
            time,
            rng,
        })
    }

    /// Our own identity, never admitted to the book.
    pub fn own_id(&self) -> NodeId {
        self.own_id
    }

    /// Book configuration.
    pub fn config(&self) -> &AddressBookConfig {
        &self.config
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.time.now()
    }

    pub(crate) fn random_tie_break(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.rng.fill_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Admission checks shared by gossip and file loading.
    pub(crate) fn admissible(&self, addr: &PeerAddress) -> Result<(), RejectReason> {
        if addr.id == self.own_id {
            return Err(RejectReason::OwnAddress);
        }
        if !addr.is_valid() {
            return Err(RejectReason::InvalidAddress);
        }
        if self.config.strict_routing && !is_routable(&addr.ip) {
            return Err(RejectReason::Unroutable);
        }
        Ok(())
    }

    /// Record `addr` as reported by `src`.
    ///
    /// Placement is deterministic: the same address from the same source
    /// group always targets the same new bucket. A full bucket first sheds
    /// a bad entry; otherwise its oldest entry is replaced only when the
    /// newcomer's source group is less represented there or the victim is
    /// stale.
    pub fn add_address(&self, addr: PeerAddress, src: PeerAddress) -> AddOutcome {
        if let Err(reason) = self.admissible(&addr) {
            trace!(peer = %addr, %reason, "Rejected address");
            return AddOutcome::Rejected(reason);
        }

        let now = self.now();
        let tie_break = self.random_tie_break();
        let mut state = self.state.write();

        if state.contains(&addr.id) {
            return AddOutcome::Duplicate;
        }

        let group = GroupKey::from_ip(&addr.ip);
        if state.group_total(&group) >= self.config.max_per_subnet_total {
            return AddOutcome::Rejected(RejectReason::SubnetLimit);
        }

        let index = state.new_bucket_index(&self.config, &addr, &src);
        let bucket = state.new_table.bucket(index);
        if bucket.subnet_count(&group) >= self.config.max_per_subnet_per_bucket {
            return AddOutcome::Rejected(RejectReason::SubnetLimit);
        }

        if bucket.len() >= self.config.bucket_size {
            let src_group = GroupKey::from_ip(&src.ip);
            let Some(victim) = self.eviction_victim(&state, index, &src_group, now) else {
                trace!(peer = %addr, bucket = index, "New bucket full, keeping incumbents");
                return AddOutcome::Rejected(RejectReason::BucketFull);
            };
            if let Some(evicted) = state.new_table.remove(&victim) {
                debug!(evicted = %evicted.addr, added = %addr, bucket = index, "Evicted address");
            }
        }

        let mut entry = AddrBookEntry::new(addr, src, now, tie_break);
        entry.bucket = index;
        state.new_table.insert(index, entry);
        AddOutcome::Added
    }

    fn eviction_victim(
        &self,
        state: &BookState,
        index: usize,
        candidate_src: &GroupKey,
        now: Timestamp,
    ) -> Option<NodeId> {
        let bucket = state.new_table.bucket(index);
        if let Some(bad) = bucket.first_bad(self.config.max_failures) {
            return Some(bad);
        }
        let victim = bucket.oldest()?;
        let more_diverse = bucket.source_count(candidate_src) < bucket.source_count(&victim.source_group());
        let stale = now.secs_since(victim.last_seen) >= self.config.eviction_min_age_secs;
        (more_diverse || stale).then_some(victim.addr.id)
    }

    /// Record a successful exchange: promote to vetted and reset failures.
    ///
    /// A full vetted bucket demotes its oldest entry back to the new table.
    /// Returns false when the identity is not in the book.
    pub fn mark_good(&self, id: &NodeId) -> bool {
        let now = self.now();
        let mut state = self.state.write();

        if let Some(entry) = state.vetted_table.get_mut(id) {
            entry.last_seen = now;
            entry.last_success = Some(now);
            entry.failures = 0;
            return true;
        }

        let Some(mut entry) = state.new_table.remove(id) else {
            return false;
        };
        entry.bucket_type = BucketType::Vetted;
        entry.last_seen = now;
        entry.last_success = Some(now);
        entry.failures = 0;

        let index = state.vetted_bucket_index(&self.config, &entry.addr);
        if state.vetted_table.bucket(index).len() >= self.config.bucket_size {
            let oldest = state.vetted_table.bucket(index).oldest().map(|e| e.addr.id);
            if let Some(demoted) = oldest.and_then(|victim| state.vetted_table.remove(&victim)) {
                debug!(peer = %demoted.addr, bucket = index, "Demoted vetted address");
                state.demote_to_new(&self.config, demoted);
            }
        }

        debug!(peer = %entry.addr, bucket = index, "Promoted address to vetted");
        entry.bucket = index;
        state.vetted_table.insert(index, entry);
        true
    }

    /// Record a dial attempt.
    pub fn mark_attempt(&self, id: &NodeId) {
        let now = self.now();
        if let Some(entry) = self.state.write().entry_mut(id) {
            entry.last_attempt = Some(now);
        }
    }

    /// Record a failed attempt. At the failure threshold a vetted entry is
    /// demoted to new with its counter reset; a new entry is evicted.
    pub fn mark_attempt_failed(&self, id: &NodeId) {
        let now = self.now();
        let max_failures = self.config.max_failures;
        let mut state = self.state.write();

        let Some(entry) = state.entry_mut(id) else {
            return;
        };
        entry.last_attempt = Some(now);
        entry.failures = entry.failures.saturating_add(1);
        if entry.failures < max_failures {
            return;
        }
        let bucket_type = entry.bucket_type;

        match bucket_type {
            BucketType::Vetted => {
                if let Some(mut demoted) = state.vetted_table.remove(id) {
                    debug!(peer = %demoted.addr, "Demoting vetted address after failures");
                    demoted.failures = 0;
                    state.demote_to_new(&self.config, demoted);
                }
            }
            BucketType::New => {
                if let Some(evicted) = state.new_table.remove(id) {
                    debug!(peer = %evicted.addr, failures = evicted.failures, "Evicted failing address");
                }
            }
        }
    }

    /// Remove an address. Returns whether it was present.
    pub fn remove_address(&self, id: &NodeId) -> bool {
        let mut state = self.state.write();
        state.vetted_table.remove(id).is_some() || state.new_table.remove(id).is_some()
    }

    /// Weighted random pick over entries not in `exclude` and not attempted
    /// within the cooldown window.
    ///
    /// Weight is the class weight ([`VETTED_WEIGHT`] or [`NEW_WEIGHT`]),
    /// scaled by recency `1 / (1 + days unseen)` and by `0.66` per failure.
    pub fn pick_address(&self, exclude: &HashSet<NodeId>) -> Option<PeerAddress> {
        let now = self.now();
        let state = self.state.read();

        let candidates: Vec<(PeerAddress, f64)> = state
            .iter()
            .filter(|e| !exclude.contains(&e.addr.id))
            .filter(|e| !e.recently_attempted(now, self.config.attempt_cooldown_secs))
            .map(|e| (e.addr, selection_weight(e, now)))
            .collect();
        drop(state);

        let total: f64 = candidates.iter().map(|(_, w)| w).sum();
        if candidates.is_empty() || total <= 0.0 {
            return None;
        }

        let mut target = self.rng.random_f64() * total;
        for (addr, weight) in &candidates {
            if target < *weight {
                return Some(*addr);
            }
            target -= weight;
        }
        candidates.last().map(|(addr, _)| *addr)
    }

    /// Up to `n` addresses spread across subnet groups: groups are visited
    /// in random order, one address per group per round.
    pub fn random_addresses(&self, n: usize) -> Vec<PeerAddress> {
        let mut groups: Vec<Vec<PeerAddress>> = {
            let state = self.state.read();
            let mut by_group: BTreeMap<GroupKey, Vec<PeerAddress>> = BTreeMap::new();
            for entry in state.iter() {
                by_group.entry(entry.group()).or_default().push(entry.addr);
            }
            by_group.into_values().collect()
        };

        shuffle(self.rng.as_ref(), &mut groups);
        for group in &mut groups {
            shuffle(self.rng.as_ref(), group);
        }

        let mut selected = Vec::with_capacity(n.min(self.size()));
        let mut round = 0;
        while selected.len() < n {
            let mut progressed = false;
            for group in &groups {
                if let Some(addr) = group.get(round) {
                    selected.push(*addr);
                    progressed = true;
                    if selected.len() == n {
                        break;
                    }
                }
            }
            if !progressed {
                break;
            }
            round += 1;
        }
        selected
    }

    /// How many addresses to serve per request: 23% of the book, at least
    /// 32 (or the whole book if smaller), at most 250.
    pub fn selection_size(&self) -> usize {
        let size = self.size();
        let percent = size * GET_SELECTION_PERCENT / 100;
        percent.max(MIN_GET_SELECTION.min(size)).min(MAX_GET_SELECTION)
    }

    /// Total entries.
    pub fn size(&self) -> usize {
        self.state.read().len()
    }

    /// Whether the book holds no entries.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Whether the identity is in the book.
    pub fn has_address(&self, id: &NodeId) -> bool {
        self.state.read().contains(id)
    }

    /// Snapshot of one entry.
    pub fn entry(&self, id: &NodeId) -> Option<AddrBookEntry> {
        self.state.read().entry(id).cloned()
    }

    /// Every address in the book.
    pub fn addresses(&self) -> Vec<PeerAddress> {
        self.state.read().iter().map(|e| e.addr).collect()
    }

    /// Whether peers should be asked for more addresses.
    pub fn need_more_addresses(&self) -> bool {
        self.size() < self.config.need_address_threshold
    }

    /// Get statistics
    pub fn stats(&self) -> AddressBookStats {
        let state = self.state.read();
        AddressBookStats {
            new_count: state.new_table.len(),
            vetted_count: state.vetted_table.len(),
            new_bucket_count: state.new_table.bucket_count(),
            vetted_bucket_count: state.vetted_table.bucket_count(),
        }
    }
}

fn selection_weight(entry: &AddrBookEntry, now: Timestamp) -> f64 {
    let class = match entry.bucket_type {
        BucketType::Vetted => VETTED_WEIGHT,
        BucketType::New => NEW_WEIGHT,
    };
    let days_unseen = now.secs_since(entry.last_seen) as f64 / 86_400.0;
    let recency = 1.0 / (1.0 + days_unseen);
    let penalty = FAILURE_PENALTY.powi(entry.failures.min(MAX_PENALIZED_FAILURES) as i32);
    class * recency * penalty
}
