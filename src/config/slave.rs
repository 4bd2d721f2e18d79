use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Slave poll engine tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Unit address in 1..=247, or 0 for a broadcast-only listener.
    pub address: u8,

    /// Start in listen-only mode.
    #[serde(default)]
    pub listen_only: bool,

    /// Optional pause before transmitting a reply, for peers that need
    /// turnaround margin.
    #[serde(with = "humantime_serde", default)]
    pub delay_before_reply: Duration,

    /// Timeout of one poll call.
    #[serde(with = "humantime_serde")]
    pub poll_timeout: Duration,

    /// Size of each of the separate RX and TX data buffers.
    pub buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: 1,
            listen_only: false,
            delay_before_reply: Duration::ZERO,
            poll_timeout: Duration::from_secs(1),
            buffer_size: 256,
        }
    }
}
