//! # Churn Scenarios
//!
//! In seed mode every connection is closed once its grace period runs
//! out, whether or not the exchange finished. A peer that never answered
//! is charged one failure, no matter how many deadlines it missed.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use seed_discovery::test_utils::{node_id, MemoryNetwork};
    use seed_discovery::{PexConfig, PexMessage, Transport};

    use crate::integration::fixtures::{
        addr, crawler_switch, eventually, make_book, peer, public_addrs, seed, ScriptedPeer,
    };

    // =============================================================================
    // TEST GROUP 1: Outbound
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_silent_seed_is_churned_and_charged_once() {
        let network = MemoryNetwork::new();
        let silent = ScriptedPeer::spawn(&network, 1, None).await;

        let book = make_book(node_id(10));
        let crawler = crawler_switch(
            &network,
            10,
            PexConfig::for_testing(),
            3,
            vec![seed(1)],
            Arc::clone(&book),
        );
        crawler.start().await.unwrap();

        assert!(eventually(|| crawler.is_connected(&node_id(1))).await);
        assert_eq!(silent.requests(), 1);

        // Request timeout (2 s) and then churn (3 s) both pass.
        assert!(eventually(|| silent.closed() == 1).await);
        assert!(eventually(|| !crawler.is_connected(&node_id(1))).await);
        assert_eq!(book.entry(&node_id(1)).unwrap().failures, 1);

        // In cooldown now, so the next crawl rounds leave it alone.
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        assert_eq!(silent.requests(), 1);
        assert_eq!(book.entry(&node_id(1)).unwrap().failures, 1);

        crawler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_answering_seed_is_closed_without_penalty() {
        let network = MemoryNetwork::new();
        let talker = ScriptedPeer::spawn(&network, 1, Some(public_addrs(5))).await;

        let book = make_book(node_id(10));
        let crawler = crawler_switch(
            &network,
            10,
            PexConfig::for_testing(),
            3,
            vec![seed(1)],
            Arc::clone(&book),
        );
        crawler.start().await.unwrap();

        assert!(eventually(|| talker.closed() >= 1).await);
        assert_eq!(book.entry(&node_id(1)).unwrap().failures, 0);
        assert!(book.size() >= 6);

        crawler.stop().await;
    }

    // =============================================================================
    // TEST GROUP 2: Inbound
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_silent_inbound_peer_is_churned_and_charged_once() {
        let network = MemoryNetwork::new();
        let book = make_book(node_id(10));
        // No outbound slots: the node only serves.
        let node = crawler_switch(&network, 10, PexConfig::for_testing(), 0, vec![], Arc::clone(&book));
        node.start().await.unwrap();

        let mut client = network
            .transport(node_id(5), addr(5))
            .dial(&peer(10))
            .await
            .unwrap();

        // Seed mode asks every peer, inbound ones included.
        assert_eq!(client.receive().await.unwrap(), Some(PexMessage::AddrRequest));
        assert!(eventually(|| book.has_address(&node_id(5))).await);

        // We never answer and never ask, so only churn ends the connection.
        assert_eq!(client.receive().await.unwrap(), None);
        assert!(eventually(|| node.connection_count() == 0).await);
        assert_eq!(book.entry(&node_id(5)).unwrap().failures, 1);

        node.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_inbound_exchange_closes_before_churn() {
        let network = MemoryNetwork::new();
        let book = make_book(node_id(10));
        for addr in public_addrs(10) {
            book.add_address(addr, peer(9));
        }
        let node = crawler_switch(&network, 10, PexConfig::for_testing(), 0, vec![], Arc::clone(&book));
        node.start().await.unwrap();

        let mut client = network
            .transport(node_id(5), addr(5))
            .dial(&peer(10))
            .await
            .unwrap();
        let started = tokio::time::Instant::now();

        assert_eq!(client.receive().await.unwrap(), Some(PexMessage::AddrRequest));
        client.send(PexMessage::AddrRequest).await.unwrap();
        client
            .send(PexMessage::AddrResponse {
                addrs: public_addrs(12)[10..].to_vec(),
            })
            .await
            .unwrap();

        let served = client.receive().await.unwrap();
        assert!(matches!(served, Some(PexMessage::AddrResponse { ref addrs }) if addrs.len() == 10));
        assert_eq!(client.receive().await.unwrap(), None);
        assert!(started.elapsed() < PexConfig::for_testing().churn_grace_period);

        assert!(eventually(|| node.connection_count() == 0).await);
        let entry = book.entry(&node_id(5)).unwrap();
        assert_eq!(entry.failures, 0);
        assert!(book.has_address(&public_addrs(12)[11].id));

        node.stop().await;
    }
}
