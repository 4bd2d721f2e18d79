use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Master transaction engine tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Sleep after a broadcast request before the next transaction may
    /// start. Broadcasts are never answered, so this is the only pacing.
    #[serde(with = "humantime_serde")]
    pub turnaround_delay: Duration,

    /// Overall timeout of one unicast transaction.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Size of the shared TX/RX data buffer.
    pub buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            turnaround_delay: Duration::from_millis(100),
            request_timeout: Duration::from_secs(1),
            buffer_size: 256,
        }
    }
}
