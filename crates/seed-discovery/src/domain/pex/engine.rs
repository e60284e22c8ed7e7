//! Peer exchange engine.
//!
//! Pure protocol logic: the switch feeds it connection events and incoming
//! messages, and carries out the [`PexAction`]s it returns. All timing is
//! passed in, so the engine never sleeps or touches a socket.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::PexConfig;
use super::messages::PexMessage;
use super::session::PexSession;
use super::types::{DialTarget, PeerContext, PeerUpPlan, PexAction};
use crate::domain::{
    AddOutcome, AddressBook, ConnectionDirection, DisconnectReason, NodeId, PeerAddress, PexError,
    SeedAddress,
};

/// Address exchange state machine shared by all connections.
pub struct PexEngine {
    book: Arc<AddressBook>,
    config: PexConfig,
    seeds: Vec<SeedAddress>,
    sessions: Mutex<HashMap<NodeId, PexSession>>,
}

impl PexEngine {
    /// Create an engine over `book` with the given bootstrap seeds.
    pub fn new(book: Arc<AddressBook>, config: PexConfig, seeds: Vec<SeedAddress>) -> Self {
        Self {
            book,
            config,
            seeds,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// The address book this engine feeds.
    pub fn book(&self) -> &Arc<AddressBook> {
        &self.book
    }

    /// Engine configuration.
    pub fn config(&self) -> &PexConfig {
        &self.config
    }

    /// Configured bootstrap seeds.
    pub fn seeds(&self) -> &[SeedAddress] {
        &self.seeds
    }

    /// Number of live exchange sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Snapshot of one session.
    pub fn session(&self, id: &NodeId) -> Option<PexSession> {
        self.sessions.lock().get(id).cloned()
    }

    fn is_seed(&self, id: &NodeId) -> bool {
        self.seeds.iter().any(|s| &s.id == id)
    }

    /// A connection came up.
    ///
    /// Seed mode asks every peer for addresses at once and schedules the
    /// churn disconnect. Inbound peers' advertised listen addresses are
    /// recorded, as are bootstrap seeds we reached.
    pub fn on_peer_up(&self, peer: &PeerContext, now: Instant) -> PeerUpPlan {
        self.learn_peer_address(peer);

        let mut session = PexSession::new(peer.direction, peer.source());
        let mut plan = PeerUpPlan::default();

        let should_request = self.config.seed_mode
            || (peer.direction == ConnectionDirection::Outbound && self.book.need_more_addresses());
        if should_request {
            session.request_sent(now);
            plan.actions.push(PexAction::Send(PexMessage::AddrRequest));
            plan.request_deadline = Some(now + self.config.request_timeout);
        }
        if self.config.seed_mode {
            plan.churn_deadline = Some(now + self.config.churn_grace_period);
        }

        debug!(peer = %peer.id, direction = %peer.direction, requested = should_request, "Exchange session started");
        self.sessions.lock().insert(peer.id, session);
        plan
    }

    fn learn_peer_address(&self, peer: &PeerContext) {
        let Some(addr) = peer.address.filter(|a| a.id == peer.id) else {
            return;
        };
        let learn = match peer.direction {
            ConnectionDirection::Inbound => true,
            ConnectionDirection::Outbound => self.is_seed(&peer.id),
        };
        if learn && self.book.add_address(addr, addr) == AddOutcome::Added {
            debug!(peer = %addr, "Added connected peer to address book");
        }
    }

    /// Handle one message from `peer`.
    ///
    /// An `Err` is a protocol fault: the caller closes this connection. The
    /// failure has already been charged to the peer.
    pub fn on_message(
        &self,
        peer: &NodeId,
        msg: PexMessage,
        now: Instant,
    ) -> Result<Vec<PexAction>, PexError> {
        match msg {
            PexMessage::AddrRequest => self.handle_request(peer, now),
            PexMessage::AddrResponse { addrs } => self.handle_response(peer, addrs),
        }
    }

    fn handle_request(&self, peer: &NodeId, now: Instant) -> Result<Vec<PexAction>, PexError> {
        let complete = {
            let mut sessions = self.sessions.lock();
            let session = sessions.get_mut(peer).ok_or(PexError::UnknownPeer)?;

            if let Some(last) = session.last_request_received {
                if now.saturating_duration_since(last) < self.config.min_request_interval {
                    debug!(peer = %peer, "Ignoring address request, too soon after the last one");
                    return Ok(Vec::new());
                }
            }
            session.last_request_received = Some(now);
            session.served = true;
            self.config.seed_mode && session.exchange_complete()
        };

        let count = self.book.selection_size();
        let addrs: Vec<PeerAddress> = self
            .book
            .random_addresses(count + 1)
            .into_iter()
            .filter(|a| &a.id != peer)
            .take(count)
            .collect();
        debug!(peer = %peer, count = addrs.len(), "Serving addresses");

        let mut actions = vec![PexAction::Send(PexMessage::AddrResponse { addrs })];
        if complete {
            actions.push(PexAction::Disconnect(DisconnectReason::ExchangeComplete));
        }
        Ok(actions)
    }

    fn handle_response(
        &self,
        peer: &NodeId,
        addrs: Vec<PeerAddress>,
    ) -> Result<Vec<PexAction>, PexError> {
        let (source, complete) = {
            let mut sessions = self.sessions.lock();
            let session = sessions.get_mut(peer).ok_or(PexError::UnknownPeer)?;

            let fault = if !session.awaiting_response {
                Some(PexError::UnsolicitedResponse)
            } else if addrs.len() > self.config.max_response_addresses {
                Some(PexError::OversizedResponse {
                    count: addrs.len(),
                    max: self.config.max_response_addresses,
                })
            } else {
                addrs
                    .iter()
                    .find(|a| !a.is_valid())
                    .map(|a| PexError::MalformedAddress(a.to_string()))
            };
            if let Some(fault) = fault {
                session.awaiting_response = false;
                self.charge_failure(peer, session);
                warn!(peer = %peer, error = %fault, "Protocol violation");
                return Err(fault);
            }

            session.awaiting_response = false;
            session.response_received = true;
            (session.source, self.config.seed_mode && session.exchange_complete())
        };

        let received = addrs.len();
        let added = addrs
            .into_iter()
            .filter(|addr| self.book.add_address(*addr, source) == AddOutcome::Added)
            .count();
        self.book.mark_good(peer);
        info!(peer = %peer, received, added, book_size = self.book.size(), "Received addresses");

        Ok(if complete {
            vec![PexAction::Disconnect(DisconnectReason::ExchangeComplete)]
        } else {
            Vec::new()
        })
    }

    fn charge_failure(&self, peer: &NodeId, session: &mut PexSession) {
        if !session.failure_recorded {
            session.failure_recorded = true;
            self.book.mark_attempt_failed(peer);
        }
    }

    /// Our request to `peer` went unanswered. Charged once; the request is
    /// not retried on this connection.
    pub fn on_request_timeout(&self, peer: &NodeId) -> Vec<PexAction> {
        let mut sessions = self.sessions.lock();
        let Some(session) = sessions.get_mut(peer) else {
            return Vec::new();
        };
        if !session.awaiting_response {
            return Vec::new();
        }
        session.awaiting_response = false;
        self.charge_failure(peer, session);
        debug!(peer = %peer, "Address request timed out");

        if self.config.seed_mode && session.exchange_complete() {
            vec![PexAction::Disconnect(DisconnectReason::ExchangeComplete)]
        } else {
            Vec::new()
        }
    }

    /// A connection closed. Dropping a peer that still owes us a response
    /// (churn or protocol fault) costs it one failure, unless one was
    /// already charged.
    pub fn on_peer_down(&self, peer: &NodeId, reason: DisconnectReason) {
        let Some(mut session) = self.sessions.lock().remove(peer) else {
            return;
        };
        let charged = matches!(
            reason,
            DisconnectReason::ChurnTimeout | DisconnectReason::ProtocolViolation
        );
        if charged && session.awaiting_response {
            self.charge_failure(peer, &mut session);
        }
        debug!(peer = %peer, %reason, "Exchange session ended");
    }

    /// A dial is about to start.
    pub fn on_dial_attempt(&self, target: &DialTarget) {
        self.book.mark_attempt(&target.id());
    }

    /// A dial failed before a connection came up.
    pub fn on_dial_failed(&self, target: &DialTarget) {
        self.book.mark_attempt_failed(&target.id());
    }

    /// Up to `free_slots` dial targets, skipping identities in `busy`.
    ///
    /// Picks from the book while it has entries; an empty book falls back
    /// to the bootstrap seeds.
    pub fn dial_targets(&self, free_slots: usize, busy: &HashSet<NodeId>) -> Vec<DialTarget> {
        if free_slots == 0 {
            return Vec::new();
        }

        if self.book.is_empty() {
            let own_id = self.book.own_id();
            return self
                .seeds
                .iter()
                .filter(|s| s.id != own_id && !busy.contains(&s.id))
                .take(free_slots)
                .cloned()
                .map(DialTarget::Seed)
                .collect();
        }

        let mut exclude = busy.clone();
        let mut targets = Vec::new();
        while targets.len() < free_slots {
            let Some(addr) = self.book.pick_address(&exclude) else {
                break;
            };
            exclude.insert(addr.id);
            targets.push(DialTarget::Book(addr));
        }
        targets
    }
}
