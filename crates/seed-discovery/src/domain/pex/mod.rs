//! # Peer Exchange (PEX)
//!
//! Per-connection request/response address exchange plus the seed-mode
//! crawl and churn policy.

mod config;
mod engine;
mod messages;
mod session;
mod types;

pub use config::PexConfig;
pub use engine::PexEngine;
pub use messages::{PexMessage, PEX_CHANNEL};
pub use session::PexSession;
pub use types::{DialTarget, PeerContext, PeerUpPlan, PexAction};
