//! # Seed Crawl Scenarios
//!
//! A fresh node with an empty address book bootstraps from its seed list:
//!
//! ```text
//! crawler(10) ──dial──→ seed(1)  replies with 50 addresses
//!             ──dial──→ seed(2)  silent, stays connected
//!             ──dial──→ seed(3)  silent, stays connected
//! ```

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use seed_discovery::test_utils::{node_id, MemoryNetwork};
    use seed_discovery::{BucketType, Dialer};

    use crate::integration::fixtures::{
        crawler_switch, eventually, make_book, patient_pex, peer, public_addrs, seed, ScriptedPeer,
    };

    // =============================================================================
    // TEST GROUP 1: Bootstrap
    // =============================================================================

    #[tokio::test]
    async fn test_empty_book_bootstraps_from_three_seeds() {
        let network = MemoryNetwork::new();
        let addrs = public_addrs(50);
        let talker = ScriptedPeer::spawn(&network, 1, Some(addrs.clone())).await;
        let silent_a = ScriptedPeer::spawn(&network, 2, None).await;
        let silent_b = ScriptedPeer::spawn(&network, 3, None).await;

        let book = make_book(node_id(10));
        let crawler = crawler_switch(
            &network,
            10,
            patient_pex(),
            10,
            vec![seed(1), seed(2), seed(3)],
            Arc::clone(&book),
        );
        crawler.start().await.unwrap();

        // Every seed is dialed and asked for addresses.
        assert!(eventually(|| talker.requests() >= 1 && silent_a.requests() == 1 && silent_b.requests() == 1).await);

        // The 50 reported addresses plus the three seeds we reached.
        assert!(eventually(|| book.size() == 53).await);
        for addr in &addrs {
            let entry = book.entry(&addr.id).unwrap();
            assert_eq!(entry.src, peer(1));
            assert_eq!(entry.bucket_type, BucketType::New);
        }
        for byte in 1..=3 {
            assert!(book.has_address(&node_id(byte)));
        }
        assert_eq!(book.entry(&node_id(1)).unwrap().bucket_type, BucketType::Vetted);

        // The talker's exchange is complete, so that connection is gone.
        assert!(eventually(|| !crawler.is_connected(&node_id(1))).await);
        assert!(crawler.is_connected(&node_id(2)));
        assert!(crawler.is_connected(&node_id(3)));

        crawler.stop().await;
    }

    #[tokio::test]
    async fn test_pick_never_returns_connected_identity() {
        let network = MemoryNetwork::new();
        let _talker = ScriptedPeer::spawn(&network, 1, Some(public_addrs(50))).await;
        let _silent_a = ScriptedPeer::spawn(&network, 2, None).await;
        let _silent_b = ScriptedPeer::spawn(&network, 3, None).await;

        let book = make_book(node_id(10));
        let crawler = crawler_switch(
            &network,
            10,
            patient_pex(),
            10,
            vec![seed(1), seed(2), seed(3)],
            Arc::clone(&book),
        );
        crawler.start().await.unwrap();
        assert!(eventually(|| book.size() == 53 && crawler.connection_count() == 2).await);

        let connected: HashSet<_> = crawler.peers().into_iter().map(|(id, _)| id).collect();
        assert!(connected.contains(&node_id(2)));
        assert!(connected.contains(&node_id(3)));

        for _ in 0..200 {
            if let Some(picked) = book.pick_address(&connected) {
                assert!(!connected.contains(&picked.id));
            }
        }

        // Crawl targets skip everything connected or dialing as well.
        let busy = crawler.busy_ids();
        assert!(busy.is_superset(&connected));
        let targets = crawler.engine().dial_targets(10, &busy);
        assert!(targets.iter().all(|t| !busy.contains(&t.id())));

        crawler.stop().await;
    }

    #[tokio::test]
    async fn test_unreachable_addresses_are_charged_once() {
        let network = MemoryNetwork::new();
        let addrs = public_addrs(20);
        let _talker = ScriptedPeer::spawn(&network, 1, Some(addrs.clone())).await;

        let book = make_book(node_id(10));
        let crawler = crawler_switch(&network, 10, patient_pex(), 10, vec![seed(1)], Arc::clone(&book));
        crawler.start().await.unwrap();

        // Later crawl rounds dial the learned addresses, none of which listen.
        // The frozen book clock keeps each one in cooldown after one attempt.
        assert!(eventually(|| {
            addrs
                .iter()
                .all(|a| book.entry(&a.id).map(|e| e.failures == 1).unwrap_or(false))
        })
        .await);
        assert_eq!(book.size(), 21);

        crawler.stop().await;
    }
}
