use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::types::{DataBits, Parity, StopBits};

/// Serial line setup handed to the driver when a device is opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub device: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: 19_200,
            data_bits: DataBits::default(),
            parity: Parity::default(),
            stop_bits: StopBits::default(),
        }
    }
}

impl Config {
    /// Interval of the half-character timer for this line.
    ///
    /// One RTU character time is fixed at 11 bit times regardless of the
    /// parity setting. At 19200 baud and above, the Modbus specification
    /// pins t1.5 to 750 us and t3.5 to 1.75 ms; with the 1.5/3.5 thresholds
    /// at 3 and 7 half-character ticks, that makes the tick 250 us flat.
    pub fn half_char_interval(&self) -> Duration {
        if self.baud_rate >= 19_200 {
            Duration::from_micros(250)
        } else {
            Duration::from_micros(5_500_000u64 / self.baud_rate as u64)
        }
    }

    pub fn serial_port_info(&self) -> String {
        format!(
            "{} ({} baud, {} data bits, {} parity, {} stop bits)",
            self.device, self.baud_rate, self.data_bits, self.parity, self.stop_bits
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_char_interval_fixed_above_19200() {
        for baud in [19_200u32, 38_400, 115_200] {
            let config = Config {
                baud_rate: baud,
                ..Default::default()
            };
            assert_eq!(config.half_char_interval(), Duration::from_micros(250));
        }
    }

    #[test]
    fn test_half_char_interval_scales_below_19200() {
        let config = Config {
            baud_rate: 9_600,
            ..Default::default()
        };
        // 11 bit times / 2 at 9600 baud.
        assert_eq!(config.half_char_interval(), Duration::from_micros(572));
    }
}
