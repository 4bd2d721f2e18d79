use serde::{Deserialize, Serialize};

use crate::config::types::TransmissionMode;

fn default_line_feed() -> u8 {
    0x0A
}

fn default_prescaler() -> u16 {
    1
}

/// Per-device transport tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active transmission mode.
    pub mode: TransmissionMode,

    /// ASCII trailer line-feed character. Configurable because some peers
    /// terminate frames with something other than 0x0A.
    #[serde(default = "default_line_feed")]
    pub ascii_line_feed: u8,

    /// Multiplier applied to the 1.5/2.0/3.5 character-time thresholds of
    /// the half-character timer.
    #[serde(default = "default_prescaler")]
    pub char_time_prescaler: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: TransmissionMode::default(),
            ascii_line_feed: default_line_feed(),
            char_time_prescaler: default_prescaler(),
        }
    }
}
