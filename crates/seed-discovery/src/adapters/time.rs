//! Wall clock for address book timestamps.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::domain::Timestamp;
use crate::ports::TimeSource;

/// Unix time from the system clock, in whole seconds.
///
/// A clock set before 1970 reads as zero rather than failing.
///
/// ```rust
/// use seed_discovery::adapters::SystemTimeSource;
/// use seed_discovery::ports::TimeSource;
///
/// assert!(SystemTimeSource::new().now().as_secs() > 0);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl SystemTimeSource {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);
        Timestamp::new(secs)
    }
}
