use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for lock acquisition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LockConfig {
    /// Maximum wall-clock wait for an in-process lock grant.
    pub acquire_timeout: Duration,
    /// Polling interval for the advisory lock-file protocol.
    pub retry_interval: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_secs(5),
            retry_interval: Duration::from_millis(50),
        }
    }
}

impl LockConfig {
    /// A configuration that never waits: the first failed attempt times out.
    /// Useful in tests and interactive probes.
    pub fn no_wait() -> Self {
        Self {
            acquire_timeout: Duration::ZERO,
            retry_interval: Duration::from_millis(1),
        }
    }
}
