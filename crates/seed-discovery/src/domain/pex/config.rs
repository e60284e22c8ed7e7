//! Peer exchange configuration.

use std::time::Duration;

/// Peer exchange configuration
#[derive(Debug, Clone)]
pub struct PexConfig {
    /// Crawl aggressively and close every connection once its exchange is done
    pub seed_mode: bool,
    /// Seed mode: connections are closed this long after they come up
    pub churn_grace_period: Duration,
    /// How long to wait for a response to our request
    pub request_timeout: Duration,
    /// Requests from one peer closer together than this are ignored
    pub min_request_interval: Duration,
    /// Upper bound on addresses in one response
    pub max_response_addresses: usize,
    /// Interval between crawl rounds
    pub crawl_period: Duration,
    /// Interval between address book flushes
    pub save_interval: Duration,
}

impl Default for PexConfig {
    fn default() -> Self {
        Self {
            seed_mode: true,
            churn_grace_period: Duration::from_secs(30),
            request_timeout: Duration::from_secs(15),
            min_request_interval: Duration::from_secs(10),
            max_response_addresses: 250,
            crawl_period: Duration::from_secs(30),
            save_interval: Duration::from_secs(120),
        }
    }
}

impl PexConfig {
    /// Short timers for tests
    pub fn for_testing() -> Self {
        Self {
            seed_mode: true,
            churn_grace_period: Duration::from_secs(3),
            request_timeout: Duration::from_secs(2),
            min_request_interval: Duration::from_secs(1),
            max_response_addresses: 250,
            crawl_period: Duration::from_secs(1),
            save_interval: Duration::from_secs(5),
        }
    }
}
