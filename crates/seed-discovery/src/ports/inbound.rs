//! # Driving Ports (Inbound API)
//!
//! APIs this subsystem exposes. The crawl loop drives connection
//! establishment through [`Dialer`], which the switch implements.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::domain::{DialTarget, NodeId, SwitchError};

/// Outbound connection control used by the crawl loop.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Outbound slots not taken by live connections or in-flight dials.
    fn free_outbound_slots(&self) -> usize;

    /// Identities that are connected or currently being dialed.
    fn busy_ids(&self) -> HashSet<NodeId>;

    /// Dial the target and register the connection on success.
    async fn dial(&self, target: DialTarget) -> Result<(), SwitchError>;
}
