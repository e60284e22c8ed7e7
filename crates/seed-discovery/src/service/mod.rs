//! # Seed Node Services
//!
//! Long-running tasks wiring the domain to the transport:
//!
//! - [`Switch`] - listener, dialer and one worker per live connection
//! - [`Crawler`] - periodic dialing from the book, plus book flushes

mod crawler;
mod switch;

use tokio::sync::watch;

pub use crawler::Crawler;
pub use switch::{PeerHandle, Switch, SwitchConfig};

/// Resolves once the flag turns true or its sender is gone.
pub(crate) async fn wait_for_stop(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}
