//! Connection slots configuration.

/// Connection slots configuration
#[derive(Debug, Clone)]
pub struct ConnectionSlotsConfig {
    /// Maximum outbound connections, in-flight dials included
    pub max_outbound: usize,
    /// Maximum inbound connections
    pub max_inbound: usize,
    /// Allow several connections from the same IP address
    pub allow_duplicate_ip: bool,
}

impl Default for ConnectionSlotsConfig {
    fn default() -> Self {
        Self {
            max_outbound: 1000,
            max_inbound: 1000,
            allow_duplicate_ip: true,
        }
    }
}

impl ConnectionSlotsConfig {
    /// Testing config with smaller limits
    pub fn for_testing() -> Self {
        Self {
            max_outbound: 3,
            max_inbound: 5,
            allow_duplicate_ip: true,
        }
    }
}
