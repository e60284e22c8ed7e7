//! # Loopback TCP Scenario
//!
//! Two seed nodes over real sockets: one with a populated book, one that
//! only knows the first as its bootstrap seed.

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::Arc;

    use seed_discovery::test_utils::{indexed_node_id, node_id};
    use seed_discovery::{
        AddressBook, BucketType, ConnectionSlotsConfig, NodeId, NodeInfo, PeerAddress, PexConfig,
        PexEngine, SeedAddress, Switch, SwitchConfig, TcpTransport, TcpTransportConfig, Transport,
    };

    use crate::integration::fixtures::{eventually, make_book, peer};

    const NETWORK: &str = "tinyseed-test";

    fn tcp_switch(
        id: NodeId,
        seeds: Vec<SeedAddress>,
        book: Arc<AddressBook>,
    ) -> Arc<Switch> {
        let info = NodeInfo {
            id,
            listen_addr: "tcp://127.0.0.1:0".to_string(),
            network: NETWORK.to_string(),
            version: "0.5.9".to_string(),
            moniker: format!("{NETWORK}-seed"),
        };
        let transport: Arc<dyn Transport> = Arc::new(TcpTransport::new(TcpTransportConfig::new(info)));
        let engine = Arc::new(PexEngine::new(book, PexConfig::for_testing(), seeds));
        let config = SwitchConfig {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            slots: ConnectionSlotsConfig::for_testing(),
            ..SwitchConfig::for_testing()
        };
        Switch::new(id, config, transport, engine)
    }

    /// Loopback addresses in distinct /16s on a closed port, so dialing
    /// them fails fast without leaving the host.
    fn closed_loopback_addrs(count: u16) -> Vec<PeerAddress> {
        (0..count)
            .map(|i| {
                let ip = IpAddr::V4(Ipv4Addr::new(127, (i + 1) as u8, 0, 1));
                PeerAddress::new(indexed_node_id(i), ip, 1)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_crawler_learns_addresses_over_tcp() {
        let seed_book = make_book(node_id(1));
        let known = closed_loopback_addrs(10);
        for addr in &known {
            seed_book.add_address(*addr, peer(9));
        }
        assert_eq!(seed_book.size(), 10);

        let seed_node = tcp_switch(node_id(1), vec![], Arc::clone(&seed_book));
        let seed_addr = seed_node.start().await.unwrap();

        let seed: SeedAddress = format!("{}@127.0.0.1:{}", node_id(1), seed_addr.port())
            .parse()
            .unwrap();
        let book = make_book(node_id(2));
        let crawler = tcp_switch(node_id(2), vec![seed], Arc::clone(&book));
        crawler.start().await.unwrap();

        assert!(eventually(|| known.iter().all(|a| book.has_address(&a.id))).await);
        assert!(eventually(|| {
            book.entry(&node_id(1)).map(|e| e.bucket_type) == Some(BucketType::Vetted)
        })
        .await);

        // Both sides hang up once the exchange is done.
        assert!(eventually(|| seed_node.connection_count() == 0).await);

        crawler.stop().await;
        seed_node.stop().await;
    }

    #[tokio::test]
    async fn test_wrong_network_is_never_admitted() {
        let seed_node = tcp_switch(node_id(1), vec![], make_book(node_id(1)));
        let seed_addr = seed_node.start().await.unwrap();

        let info = NodeInfo {
            id: node_id(3),
            listen_addr: "tcp://127.0.0.1:0".to_string(),
            network: "other-network".to_string(),
            version: "0.5.9".to_string(),
            moniker: "stranger".to_string(),
        };
        let stranger = TcpTransport::new(TcpTransportConfig::new(info));
        let target = PeerAddress::new(node_id(1), seed_addr.ip(), seed_addr.port());
        assert!(stranger.dial(&target).await.is_err());
        assert_eq!(seed_node.connection_count(), 0);

        seed_node.stop().await;
    }
}
