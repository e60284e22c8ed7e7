//! Connection switch.
//!
//! Owns the listener, performs outbound dials for the crawler, admits
//! handshaken connections through the slot manager and runs one worker
//! task per live connection.
//!
//! ## Shutdown Order
//!
//! 1. Stop accepting and stop the crawler
//! 2. Signal every connection worker and wait up to the grace period
//! 3. Abort stragglers
//! 4. Flush the address book

use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::crawler::Crawler;
use super::wait_for_stop;
use crate::domain::{
    AcceptResult, ConnectionDirection, ConnectionRecord, ConnectionSlots, ConnectionSlotsConfig,
    ConnectionStats, DialTarget, DisconnectReason, NodeId, PeerAddress, PeerContext, PeerUpPlan,
    PexAction, PexEngine, PexMessage, SeedAddress, SwitchError, TransportError,
};
use crate::ports::{Dialer, Listener, PeerConnection, Transport};

/// Switch configuration
#[derive(Debug, Clone)]
pub struct SwitchConfig {
    /// Address to accept connections on
    pub listen_addr: SocketAddr,
    /// Connection caps and duplicate-IP policy
    pub slots: ConnectionSlotsConfig,
    /// Bound on connect plus handshake for one dial
    pub dial_timeout: Duration,
    /// How long workers get to finish after shutdown is signaled
    pub shutdown_grace: Duration,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 36656)),
            slots: ConnectionSlotsConfig::default(),
            dial_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl SwitchConfig {
    /// Small caps and short timeouts for tests
    pub fn for_testing() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            slots: ConnectionSlotsConfig::for_testing(),
            dial_timeout: Duration::from_secs(2),
            shutdown_grace: Duration::from_secs(1),
        }
    }
}

/// Control handle kept with each live connection.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    commands: mpsc::UnboundedSender<DisconnectReason>,
}

impl PeerHandle {
    /// Ask the worker to close the connection. False if it already exited.
    pub fn disconnect(&self, reason: DisconnectReason) -> bool {
        self.commands.send(reason).is_ok()
    }
}

type Slots = Arc<RwLock<ConnectionSlots<PeerHandle>>>;

/// Listener, dialer and connection registry of a seed node.
pub struct Switch {
    own_id: NodeId,
    config: SwitchConfig,
    transport: Arc<dyn Transport>,
    engine: Arc<PexEngine>,
    slots: Slots,
    workers: Mutex<JoinSet<()>>,
    /// Accept loop and crawler
    background: Mutex<Vec<JoinHandle<()>>>,
    stop_accepting: watch::Sender<bool>,
    stop_workers: watch::Sender<bool>,
    local_addr: Mutex<Option<SocketAddr>>,
    started: AtomicBool,
}

impl Switch {
    /// Create a stopped switch.
    pub fn new(
        own_id: NodeId,
        config: SwitchConfig,
        transport: Arc<dyn Transport>,
        engine: Arc<PexEngine>,
    ) -> Arc<Self> {
        let slots = ConnectionSlots::new(own_id, config.slots.clone());
        Arc::new(Self {
            own_id,
            config,
            transport,
            engine,
            slots: Arc::new(RwLock::new(slots)),
            workers: Mutex::new(JoinSet::new()),
            background: Mutex::new(Vec::new()),
            stop_accepting: watch::channel(false).0,
            stop_workers: watch::channel(false).0,
            local_addr: Mutex::new(None),
            started: AtomicBool::new(false),
        })
    }

    /// Bind the listener and start the accept loop and the crawler.
    /// Returns the bound address.
    pub async fn start(self: &Arc<Self>) -> Result<SocketAddr, SwitchError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SwitchError::AlreadyStarted);
        }

        let listener = match self.transport.listen(self.config.listen_addr).await {
            Ok(listener) => listener,
            Err(source) => {
                self.started.store(false, Ordering::SeqCst);
                return Err(SwitchError::Listen {
                    addr: self.config.listen_addr.to_string(),
                    source,
                });
            }
        };
        let local_addr = listener.local_addr();
        *self.local_addr.lock() = Some(local_addr);

        let accept = tokio::spawn(Arc::clone(self).accept_loop(listener, self.stop_accepting.subscribe()));
        let dialer: Arc<dyn Dialer> = Arc::clone(self) as Arc<dyn Dialer>;
        let crawler = Crawler::new(Arc::clone(&self.engine), dialer);
        let crawl = tokio::spawn(crawler.run(self.stop_accepting.subscribe()));
        self.background.lock().extend([accept, crawl]);

        info!(
            %local_addr,
            max_inbound = self.config.slots.max_inbound,
            max_outbound = self.config.slots.max_outbound,
            "Switch started"
        );
        Ok(local_addr)
    }

    /// Shut down in order: accept loop and crawler, then connection
    /// workers (aborted after the grace period), then flush the book.
    pub async fn stop(&self) {
        info!("Stopping switch");
        self.stop_accepting.send_replace(true);
        let background: Vec<_> = self.background.lock().drain(..).collect();
        for handle in background {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background task failed");
            }
        }

        self.stop_workers.send_replace(true);
        let mut workers = std::mem::take(&mut *self.workers.lock());
        let drained = tokio::time::timeout(self.config.shutdown_grace, async {
            while workers.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(remaining = workers.len(), "Aborting connection workers");
            workers.abort_all();
            while workers.join_next().await.is_some() {}
        }

        let book = Arc::clone(self.engine.book());
        match tokio::task::spawn_blocking(move || book.save()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to save address book"),
            Err(e) => warn!(error = %e, "Address book save task failed"),
        }
        info!("Switch stopped");
    }

    /// Our identity.
    pub fn own_id(&self) -> NodeId {
        self.own_id
    }

    /// Bound listen address once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// The exchange engine.
    pub fn engine(&self) -> &Arc<PexEngine> {
        &self.engine
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.slots.read().len()
    }

    /// Whether `id` is connected.
    pub fn is_connected(&self, id: &NodeId) -> bool {
        self.slots.read().contains(id)
    }

    /// Identities and directions of live connections.
    pub fn peers(&self) -> Vec<(NodeId, ConnectionDirection)> {
        self.slots
            .read()
            .records()
            .map(|r| (r.id, r.direction))
            .collect()
    }

    /// Connection counts against the caps.
    pub fn stats(&self) -> ConnectionStats {
        self.slots.read().stats()
    }

    /// Close the connection to `id`. False when not connected.
    pub fn disconnect(&self, id: &NodeId, reason: DisconnectReason) -> bool {
        self.slots
            .read()
            .get(id)
            .is_some_and(|record| record.handle.disconnect(reason))
    }

    async fn accept_loop(self: Arc<Self>, mut listener: Box<dyn Listener>, mut stop: watch::Receiver<bool>) {
        loop {
            let accepted = tokio::select! {
                _ = wait_for_stop(&mut stop) => break,
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok(conn) => {
                    if let Err(e) = self.admit(conn, ConnectionDirection::Inbound).await {
                        debug!(error = %e, "Inbound connection refused");
                    }
                }
                Err(TransportError::Closed) => break,
                Err(e) => warn!(error = %e, "Accept failed"),
            }
        }
        debug!("Accept loop stopped");
    }

    /// Register a handshaken connection and start its worker.
    async fn admit(
        &self,
        mut conn: Box<dyn PeerConnection>,
        direction: ConnectionDirection,
    ) -> Result<(), SwitchError> {
        let id = conn.remote_id();
        let remote_addr = conn.remote_addr();
        let listen_addr = conn.listen_addr();

        let (commands, command_rx) = mpsc::unbounded_channel();
        let record = ConnectionRecord {
            id,
            direction,
            remote_addr,
            listen_addr,
            connected_at: Instant::now(),
            handle: PeerHandle { commands },
        };
        let admitted = self.slots.write().try_admit(record);
        if let AcceptResult::Rejected(reason) = admitted {
            conn.close().await;
            return Err(SwitchError::Rejected(reason.to_string()));
        }

        let peer = PeerContext {
            id,
            direction,
            remote_addr,
            address: listen_addr,
        };
        let plan = self.engine.on_peer_up(&peer, Instant::now());
        debug!(peer = %id, %direction, remote = %remote_addr, "Peer connected");

        let worker = PeerWorker {
            id,
            engine: Arc::clone(&self.engine),
            slots: Arc::clone(&self.slots),
        };
        let stop = self.stop_workers.subscribe();
        let mut workers = self.workers.lock();
        while let Some(finished) = workers.try_join_next() {
            if let Err(e) = finished {
                warn!(error = %e, "Connection worker failed");
            }
        }
        workers.spawn(worker.run(conn, plan, command_rx, stop));
        Ok(())
    }

    async fn connect(&self, target: &DialTarget) -> Result<Box<dyn PeerConnection>, SwitchError> {
        let addr = match target {
            DialTarget::Book(addr) => *addr,
            DialTarget::Seed(seed) => resolve_seed(seed).await?,
        };
        let conn = tokio::time::timeout(self.config.dial_timeout, self.transport.dial(&addr))
            .await
            .map_err(|_| TransportError::Timeout(format!("dial {addr}")))??;
        Ok(conn)
    }
}

#[async_trait]
impl Dialer for Switch {
    fn free_outbound_slots(&self) -> usize {
        self.slots.read().free_outbound_slots()
    }

    fn busy_ids(&self) -> HashSet<NodeId> {
        self.slots.read().busy_ids()
    }

    async fn dial(&self, target: DialTarget) -> Result<(), SwitchError> {
        let id = target.id();
        if id == self.own_id {
            return Err(SwitchError::SelfDial);
        }
        let reserved = self.slots.write().reserve_dial(id);
        if let Err(rejection) = reserved {
            return Err(SwitchError::Rejected(rejection.to_string()));
        }

        match self.connect(&target).await {
            Ok(conn) => self.admit(conn, ConnectionDirection::Outbound).await,
            Err(e) => {
                self.slots.write().release_dial(&id);
                Err(e)
            }
        }
    }
}

/// Seed hosts may be DNS names; the first resolved address is used.
async fn resolve_seed(seed: &SeedAddress) -> Result<PeerAddress, SwitchError> {
    if let Some(addr) = seed.as_peer_address() {
        return Ok(addr);
    }
    let resolve_error = |reason: String| SwitchError::Resolve {
        host: seed.host.clone(),
        reason,
    };
    let mut resolved = tokio::net::lookup_host((seed.host.as_str(), seed.port))
        .await
        .map_err(|e| resolve_error(e.to_string()))?;
    resolved
        .next()
        .map(|socket| PeerAddress::from_socket_addr(seed.id, socket))
        .ok_or_else(|| resolve_error("no addresses".to_string()))
}

enum PeerEvent {
    Stop,
    Command(DisconnectReason),
    Churn,
    RequestTimeout,
    Received(Result<Option<PexMessage>, TransportError>),
}

/// Drives one connection until it closes.
struct PeerWorker {
    id: NodeId,
    engine: Arc<PexEngine>,
    slots: Slots,
}

impl PeerWorker {
    async fn run(
        self,
        mut conn: Box<dyn PeerConnection>,
        plan: PeerUpPlan,
        mut commands: mpsc::UnboundedReceiver<DisconnectReason>,
        mut stop: watch::Receiver<bool>,
    ) {
        let churn_deadline = plan.churn_deadline;
        let mut request_deadline = plan.request_deadline;
        let mut outcome = self
            .apply_bounded(conn.as_mut(), plan.actions, churn_deadline, &mut stop, &mut commands)
            .await;

        let reason = loop {
            if let Some(reason) = outcome {
                break reason;
            }

            let event = tokio::select! {
                _ = wait_for_stop(&mut stop) => PeerEvent::Stop,
                Some(reason) = commands.recv() => PeerEvent::Command(reason),
                _ = sleep_until(churn_deadline) => PeerEvent::Churn,
                _ = sleep_until(request_deadline) => PeerEvent::RequestTimeout,
                received = conn.receive() => PeerEvent::Received(received),
            };

            outcome = match event {
                PeerEvent::Stop => Some(DisconnectReason::Shutdown),
                PeerEvent::Command(reason) => Some(reason),
                PeerEvent::Churn => Some(DisconnectReason::ChurnTimeout),
                PeerEvent::RequestTimeout => {
                    request_deadline = None;
                    let actions = self.engine.on_request_timeout(&self.id);
                    self.apply_bounded(conn.as_mut(), actions, churn_deadline, &mut stop, &mut commands)
                        .await
                }
                PeerEvent::Received(Ok(Some(msg))) => {
                    let kind = msg.kind();
                    match self.engine.on_message(&self.id, msg, Instant::now()) {
                        Ok(actions) => {
                            self.apply_bounded(conn.as_mut(), actions, churn_deadline, &mut stop, &mut commands)
                                .await
                        }
                        Err(e) => {
                            debug!(peer = %self.id, kind, error = %e, "Closing connection after protocol violation");
                            Some(DisconnectReason::ProtocolViolation)
                        }
                    }
                }
                PeerEvent::Received(Ok(None)) => Some(DisconnectReason::RemoteClosed),
                PeerEvent::Received(Err(
                    e @ (TransportError::Codec(_) | TransportError::FrameTooLarge { .. }),
                )) => {
                    debug!(peer = %self.id, error = %e, "Undecodable frame");
                    Some(DisconnectReason::ProtocolViolation)
                }
                PeerEvent::Received(Err(e)) => {
                    debug!(peer = %self.id, error = %e, "Connection error");
                    Some(DisconnectReason::NetworkError)
                }
            };
        };

        conn.close().await;
        self.slots.write().remove(&self.id);
        self.engine.on_peer_down(&self.id, reason);
        debug!(peer = %self.id, %reason, "Peer disconnected");
    }

    /// Carry out engine actions. A peer that stops reading must not stall
    /// the churn deadline, shutdown or disconnect commands.
    async fn apply_bounded(
        &self,
        conn: &mut dyn PeerConnection,
        actions: Vec<PexAction>,
        churn_deadline: Option<Instant>,
        stop: &mut watch::Receiver<bool>,
        commands: &mut mpsc::UnboundedReceiver<DisconnectReason>,
    ) -> Option<DisconnectReason> {
        tokio::select! {
            outcome = apply_actions(conn, actions) => outcome,
            _ = wait_for_stop(stop) => Some(DisconnectReason::Shutdown),
            Some(reason) = commands.recv() => Some(reason),
            _ = sleep_until(churn_deadline) => {
                debug!(peer = %self.id, "Churn deadline passed during send");
                Some(DisconnectReason::ChurnTimeout)
            }
        }
    }
}

/// Carry out engine actions. Returns the close reason, if any.
async fn apply_actions(conn: &mut dyn PeerConnection, actions: Vec<PexAction>) -> Option<DisconnectReason> {
    for action in actions {
        match action {
            PexAction::Send(msg) => {
                if let Err(e) = conn.send(msg).await {
                    debug!(peer = %conn.remote_id(), error = %e, "Send failed");
                    return Some(DisconnectReason::NetworkError);
                }
            }
            PexAction::Disconnect(reason) => return Some(reason),
        }
    }
    None
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
