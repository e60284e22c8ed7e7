//! Shared fixtures for the integration scenarios.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use seed_discovery::adapters::SeededRandomSource;
use seed_discovery::test_utils::{indexed_node_id, node_id, ControllableTimeSource, MemoryNetwork};
use seed_discovery::{
    AddressBook, AddressBookConfig, ConnectionSlotsConfig, NodeId, PeerAddress, PexConfig,
    PexEngine, PexMessage, SeedAddress, Switch, SwitchConfig, Transport,
};

/// Fixed wall clock for every test book.
pub const BOOK_EPOCH: u64 = 1_700_000_000;

/// In-memory address of node `byte`.
pub fn addr(byte: u8) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, byte], 26656))
}

/// Dialable address of node `byte`.
pub fn peer(byte: u8) -> PeerAddress {
    PeerAddress::from_socket_addr(node_id(byte), addr(byte))
}

/// Bootstrap seed entry for node `byte`.
pub fn seed(byte: u8) -> SeedAddress {
    format!("{}@10.0.0.{}:26656", node_id(byte), byte)
        .parse()
        .unwrap()
}

/// `count` addresses, each in its own /16. None of them is listening.
pub fn public_addrs(count: u16) -> Vec<PeerAddress> {
    (0..count)
        .map(|i| {
            let ip = format!("{}.{}.5.5", 30 + i, i);
            PeerAddress::new(indexed_node_id(i), ip.parse().unwrap(), 26656)
        })
        .collect()
}

/// Permissive book with room to spare and a frozen clock, so cooldowns
/// never expire during a test.
pub fn make_book(own: NodeId) -> Arc<AddressBook> {
    let config = AddressBookConfig {
        new_bucket_count: 256,
        bucket_size: 16,
        new_buckets_per_source_group: 64,
        ..AddressBookConfig::for_testing()
    };
    Arc::new(AddressBook::new(
        own,
        config,
        Arc::new(ControllableTimeSource::new(BOOK_EPOCH)),
        Arc::new(SeededRandomSource::new(u64::from(own.0[0]))),
    )
    .unwrap())
}

/// Seed-mode switch for node `byte` on `network`.
pub fn crawler_switch(
    network: &Arc<MemoryNetwork>,
    byte: u8,
    pex: PexConfig,
    max_outbound: usize,
    seeds: Vec<SeedAddress>,
    book: Arc<AddressBook>,
) -> Arc<Switch> {
    let id = node_id(byte);
    let transport: Arc<dyn Transport> = Arc::new(network.transport(id, addr(byte)));
    let engine = Arc::new(PexEngine::new(book, pex, seeds));
    let config = SwitchConfig {
        listen_addr: addr(byte),
        slots: ConnectionSlotsConfig {
            max_outbound,
            ..ConnectionSlotsConfig::for_testing()
        },
        ..SwitchConfig::for_testing()
    };
    Switch::new(id, config, transport, engine)
}

/// PEX timers long enough that nothing expires unless a test waits for it.
pub fn patient_pex() -> PexConfig {
    PexConfig {
        request_timeout: Duration::from_secs(60),
        churn_grace_period: Duration::from_secs(60),
        ..PexConfig::for_testing()
    }
}

/// A peer driven by the test instead of a switch. It answers every
/// address request with `reply`, or stays silent when `reply` is `None`.
pub struct ScriptedPeer {
    pub requests: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl ScriptedPeer {
    pub async fn spawn(
        network: &Arc<MemoryNetwork>,
        byte: u8,
        reply: Option<Vec<PeerAddress>>,
    ) -> Self {
        let transport = network.transport(node_id(byte), addr(byte));
        let mut listener = transport.listen(addr(byte)).await.unwrap();
        let requests = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));

        let (req, cls) = (Arc::clone(&requests), Arc::clone(&closed));
        let handle = tokio::spawn(async move {
            while let Ok(mut conn) = listener.accept().await {
                let (req, cls, reply) = (Arc::clone(&req), Arc::clone(&cls), reply.clone());
                tokio::spawn(async move {
                    while let Ok(Some(msg)) = conn.receive().await {
                        if msg != PexMessage::AddrRequest {
                            continue;
                        }
                        req.fetch_add(1, Ordering::SeqCst);
                        if let Some(addrs) = &reply {
                            let response = PexMessage::AddrResponse {
                                addrs: addrs.clone(),
                            };
                            if conn.send(response).await.is_err() {
                                break;
                            }
                        }
                    }
                    cls.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        Self {
            requests,
            closed,
            handle,
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for ScriptedPeer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Poll `check` every 50 ms for up to 10 s.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}
