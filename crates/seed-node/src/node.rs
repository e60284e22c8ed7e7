//! # Seed Node Runtime
//!
//! Wires the seed-discovery components together:
//!
//! ```text
//! SeedConfig ──→ AddressBook (loaded from disk)
//!                     │
//!                     ↓
//!                 PexEngine (seed mode, bootstrap seeds)
//!                     │
//! NodeKey ──→ TcpTransport ──→ Switch (listener, crawler, workers)
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Create the key and address book directories
//! 2. Load or generate the node key
//! 3. Load the address book
//! 4. Bind the listener and start crawling
//!
//! ## Shutdown
//!
//! `Switch::stop` stops accepting and crawling, drains connection workers
//! and flushes the address book.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use seed_discovery::adapters::{OsRandomSource, SystemTimeSource};
use seed_discovery::{
    AddressBook, NodeId, NodeInfo, PexEngine, Switch, TcpTransport, TcpTransportConfig, Transport,
};

use crate::config::SeedConfig;
use crate::node_key::NodeKey;

/// Software version announced in the handshake.
pub const NODE_VERSION: &str = "0.5.9";

/// A configured, not yet started, seed node.
pub struct SeedNode {
    config: SeedConfig,
    id: NodeId,
    book: Arc<AddressBook>,
    switch: Arc<Switch>,
}

impl SeedNode {
    /// Prepare directories, identity and the address book, and build the
    /// switch. Nothing is bound until [`SeedNode::start`].
    pub fn new(config: SeedConfig) -> Result<Self> {
        ensure_parent_dir(&config.node_key_file)?;
        ensure_parent_dir(&config.addr_book_file)?;

        let key = NodeKey::load_or_generate(&config.node_key_file)
            .context("Failed to load node key")?;
        let id = key.id();
        let switch_config = config.switch_config()?;

        let book = Arc::new(
            AddressBook::new(
                id,
                config.address_book_config(),
                Arc::new(SystemTimeSource::new()),
                Arc::new(OsRandomSource::new()),
            )
            .context("Invalid address book configuration")?,
        );
        let loaded = book.load();

        info!(
            key = %id,
            key_path = %config.node_key_file.display(),
            address_book_path = %config.addr_book_file.display(),
            loaded,
            listen = %config.laddr,
            chain = %config.chain_id,
            strict_routing = config.addr_book_strict,
            max_inbound = config.max_num_inbound_peers,
            max_outbound = config.max_num_outbound_peers,
            "tinyseed"
        );

        let engine = Arc::new(PexEngine::new(
            Arc::clone(&book),
            config.pex_config(),
            config.seed_addresses(),
        ));

        let node_info = NodeInfo {
            id,
            listen_addr: config.laddr.clone(),
            network: config.chain_id.clone(),
            version: NODE_VERSION.to_string(),
            moniker: config.moniker(),
        };
        let transport: Arc<dyn Transport> =
            Arc::new(TcpTransport::new(TcpTransportConfig::new(node_info)));
        let switch = Switch::new(id, switch_config, transport, engine);

        Ok(Self {
            config,
            id,
            book,
            switch,
        })
    }

    /// Bind the listener and start crawling. Returns the bound address.
    pub async fn start(&self) -> Result<SocketAddr> {
        let local_addr = self
            .switch
            .start()
            .await
            .with_context(|| format!("Failed to start listener on {}", self.config.laddr))?;
        Ok(local_addr)
    }

    /// Stop the switch and flush the address book.
    pub async fn shutdown(&self) {
        info!("Shutting down...");
        self.switch.stop().await;
        info!(addresses = self.book.size(), "Shutdown complete");
    }

    /// Our node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The effective configuration.
    pub fn config(&self) -> &SeedConfig {
        &self.config
    }

    /// The address book.
    pub fn address_book(&self) -> &Arc<AddressBook> {
        &self.book
    }

    /// The switch.
    pub fn switch(&self) -> &Arc<Switch> {
        &self.switch
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config(home: &Path) -> SeedConfig {
        let mut config = SeedConfig {
            laddr: "tcp://127.0.0.1:0".to_string(),
            chain_id: "testnet-1".to_string(),
            addr_book_strict: false,
            seeds: String::new(),
            ..SeedConfig::default()
        };
        config.resolve_paths(home);
        config
    }

    #[tokio::test]
    async fn test_new_creates_key_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config = local_config(dir.path());
        let node = SeedNode::new(config.clone()).unwrap();

        assert!(config.node_key_file.exists());
        assert!(config.addr_book_file.parent().unwrap().is_dir());
        assert_eq!(node.id(), NodeKey::load(&config.node_key_file).unwrap().id());
        assert!(node.address_book().is_empty());
    }

    #[tokio::test]
    async fn test_start_and_shutdown_saves_book() {
        let dir = tempfile::tempdir().unwrap();
        let config = local_config(dir.path());
        let node = SeedNode::new(config.clone()).unwrap();

        let local = node.start().await.unwrap();
        assert_ne!(local.port(), 0);
        node.shutdown().await;

        assert!(config.addr_book_file.exists());
    }

    #[tokio::test]
    async fn test_identity_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let first = SeedNode::new(local_config(dir.path())).unwrap().id();
        let second = SeedNode::new(local_config(dir.path())).unwrap().id();
        assert_eq!(first, second);
    }
}
