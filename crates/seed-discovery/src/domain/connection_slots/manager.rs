//! Connection slots manager implementation.

use std::collections::{HashMap, HashSet};

use super::config::ConnectionSlotsConfig;
use super::types::{AcceptResult, ConnectionDirection, ConnectionRecord, ConnectionStats, SlotRejection};
use crate::domain::NodeId;

/// Manages connection slots and in-flight dial reservations
#[derive(Debug)]
pub struct ConnectionSlots<H> {
    own_id: NodeId,
    /// All active connections
    connections: HashMap<NodeId, ConnectionRecord<H>>,
    /// Dials that hold an outbound slot but have not connected yet
    dialing: HashSet<NodeId>,
    /// Configuration
    config: ConnectionSlotsConfig,
}

impl<H> ConnectionSlots<H> {
    /// Create a new connection slots manager
    pub fn new(own_id: NodeId, config: ConnectionSlotsConfig) -> Self {
        Self {
            own_id,
            connections: HashMap::new(),
            dialing: HashSet::new(),
            config,
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &ConnectionSlotsConfig {
        &self.config
    }

    /// Outbound connections plus in-flight dials
    pub fn outbound_count(&self) -> usize {
        self.count(ConnectionDirection::Outbound) + self.dialing.len()
    }

    /// Get current inbound count
    pub fn inbound_count(&self) -> usize {
        self.count(ConnectionDirection::Inbound)
    }

    fn count(&self, direction: ConnectionDirection) -> usize {
        self.connections
            .values()
            .filter(|c| c.direction == direction)
            .count()
    }

    /// Outbound slots still available for dialing
    pub fn free_outbound_slots(&self) -> usize {
        self.config.max_outbound.saturating_sub(self.outbound_count())
    }

    /// Check if we have inbound slots available
    pub fn has_inbound_slot(&self) -> bool {
        self.inbound_count() < self.config.max_inbound
    }

    /// Reserve an outbound slot for dialing `id`.
    pub fn reserve_dial(&mut self, id: NodeId) -> Result<(), SlotRejection> {
        if id == self.own_id {
            return Err(SlotRejection::SelfConnection);
        }
        if self.connections.contains_key(&id) || self.dialing.contains(&id) {
            return Err(SlotRejection::DuplicateId);
        }
        if self.free_outbound_slots() == 0 {
            return Err(SlotRejection::OutboundFull);
        }
        self.dialing.insert(id);
        Ok(())
    }

    /// Give back a reservation after a failed dial.
    pub fn release_dial(&mut self, id: &NodeId) -> bool {
        self.dialing.remove(id)
    }

    /// Whether a dial to `id` is in flight
    pub fn is_dialing(&self, id: &NodeId) -> bool {
        self.dialing.contains(id)
    }

    /// Try to register a handshaken connection.
    ///
    /// Outbound connections consume their dial reservation whether or not
    /// they are admitted.
    pub fn try_admit(&mut self, record: ConnectionRecord<H>) -> AcceptResult {
        let reserved =
            record.direction == ConnectionDirection::Outbound && self.dialing.remove(&record.id);

        if record.id == self.own_id {
            return AcceptResult::Rejected(SlotRejection::SelfConnection);
        }
        if self.connections.contains_key(&record.id) {
            return AcceptResult::Rejected(SlotRejection::DuplicateId);
        }
        if !self.config.allow_duplicate_ip {
            let ip = record.remote_addr.ip();
            if self.connections.values().any(|c| c.remote_addr.ip() == ip) {
                return AcceptResult::Rejected(SlotRejection::DuplicateIp);
            }
        }
        match record.direction {
            ConnectionDirection::Inbound if !self.has_inbound_slot() => {
                return AcceptResult::Rejected(SlotRejection::InboundFull);
            }
            ConnectionDirection::Outbound if !reserved && self.free_outbound_slots() == 0 => {
                return AcceptResult::Rejected(SlotRejection::OutboundFull);
            }
            _ => {}
        }

        self.connections.insert(record.id, record);
        AcceptResult::Accepted
    }

    /// Remove a connection, releasing its slot
    pub fn remove(&mut self, id: &NodeId) -> Option<ConnectionRecord<H>> {
        self.connections.remove(id)
    }

    /// Look up a connection
    pub fn get(&self, id: &NodeId) -> Option<&ConnectionRecord<H>> {
        self.connections.get(id)
    }

    /// Whether `id` is connected
    pub fn contains(&self, id: &NodeId) -> bool {
        self.connections.contains_key(id)
    }

    /// Identities connected or being dialed
    pub fn busy_ids(&self) -> HashSet<NodeId> {
        self.connections
            .keys()
            .chain(self.dialing.iter())
            .copied()
            .collect()
    }

    /// Iterate over live connections
    pub fn records(&self) -> impl Iterator<Item = &ConnectionRecord<H>> {
        self.connections.values()
    }

    /// Number of live connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is live
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Get statistics
    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            outbound_count: self.count(ConnectionDirection::Outbound),
            inbound_count: self.inbound_count(),
            dialing_count: self.dialing.len(),
            max_outbound: self.config.max_outbound,
            max_inbound: self.config.max_inbound,
        }
    }
}
