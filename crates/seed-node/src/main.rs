//! # TinySeed
//!
//! A standalone seed node: it crawls the network, hands out the addresses
//! it has learned and hangs up quickly so the next node can connect.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging (`RUST_LOG`, default `info`)
//! 2. Resolve the home directory (`TINYSEED_HOME` or `~/.tinyseed`)
//! 3. Load configuration (file, then `ID` / `SEEDS` / `LISTENADDRESS`)
//! 4. Load the node key and address book, bind the listener
//! 5. Run until SIGINT or SIGTERM, then stop the switch and flush the book

use anyhow::{Context, Result};
use tracing::info;

use seed_node::config::{home_dir, process_env, CONFIG_FILE};
use seed_node::logging::init_logging;
use seed_node::{SeedConfig, SeedNode, ShutdownSignal};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging().context("Failed to initialize logging")?;

    let home = home_dir(process_env)?;
    let config_path = home.join(CONFIG_FILE);
    if let Some(dir) = config_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    let config = SeedConfig::load(&home, process_env).context("Failed to load configuration")?;

    let shutdown = ShutdownSignal::install().context("Failed to install signal handlers")?;
    let node = SeedNode::new(config)?;
    let local_addr = node.start().await?;
    info!(%local_addr, "Seed node is running. Press Ctrl+C to stop.");

    let signal = shutdown.recv().await;
    info!(signal, "Shutdown requested");

    node.shutdown().await;
    Ok(())
}
