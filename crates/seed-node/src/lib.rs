//! # TinySeed Node
//!
//! Library half of the `tinyseed` binary: configuration, node identity,
//! logging setup and the runtime that wires the seed-discovery crate
//! together. `main.rs` only parses the environment and handles signals.

pub mod config;
pub mod logging;
pub mod node;
pub mod node_key;
pub mod signal;

pub use config::{ConfigError, SeedConfig};
pub use node::{SeedNode, NODE_VERSION};
pub use node_key::{NodeKey, NodeKeyError};
pub use signal::ShutdownSignal;
