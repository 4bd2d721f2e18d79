use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use config::{Config as ConfigBuilder, ConfigError, Environment, File, FileFormat};

use crate::config::types::TransmissionMode;
use crate::config::{DeviceConfig, LoggingConfig, MasterConfig, SerialConfig, SlaveConfig};
use crate::frame::MAX_UNIT_ADDRESS;

/// Main application configuration.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Serial line setup
    pub serial: SerialConfig,

    /// Transport tunables
    pub device: DeviceConfig,

    /// Master engine tunables
    pub master: MasterConfig,

    /// Slave engine tunables
    pub slave: SlaveConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Default configuration directory
    pub const CONFIG_DIR: &'static str = "config";

    /// Environment variable prefix
    const ENV_PREFIX: &'static str = "MODBUS_SERIAL";

    /// Build configuration using the following priority (highest to lowest):
    /// 1. Environment variables (MODBUS_SERIAL_*)
    /// 2. Local configuration file (config/local.yaml)
    /// 3. Default configuration (config/default.yaml)
    /// 4. Built-in defaults
    pub fn new() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let builder = ConfigBuilder::builder()
            // Serial configuration
            .set_default("serial.device", defaults.serial.device)?
            .set_default("serial.baud_rate", defaults.serial.baud_rate)?
            .set_default("serial.data_bits", defaults.serial.data_bits.get())?
            .set_default("serial.parity", defaults.serial.parity.to_string())?
            .set_default("serial.stop_bits", defaults.serial.stop_bits.to_string())?
            // Device configuration
            .set_default("device.mode", defaults.device.mode.to_string())?
            .set_default("device.ascii_line_feed", defaults.device.ascii_line_feed)?
            .set_default(
                "device.char_time_prescaler",
                defaults.device.char_time_prescaler,
            )?
            // Master configuration
            .set_default(
                "master.turnaround_delay",
                format!("{}ms", defaults.master.turnaround_delay.as_millis()),
            )?
            .set_default(
                "master.request_timeout",
                format!("{}ms", defaults.master.request_timeout.as_millis()),
            )?
            .set_default("master.buffer_size", defaults.master.buffer_size as u64)?
            // Slave configuration
            .set_default("slave.address", defaults.slave.address)?
            .set_default("slave.listen_only", defaults.slave.listen_only)?
            .set_default(
                "slave.delay_before_reply",
                format!("{}ms", defaults.slave.delay_before_reply.as_millis()),
            )?
            .set_default(
                "slave.poll_timeout",
                format!("{}ms", defaults.slave.poll_timeout.as_millis()),
            )?
            .set_default("slave.buffer_size", defaults.slave.buffer_size as u64)?
            // Logging configuration
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", defaults.logging.format)?
            .set_default("logging.trace_frames", defaults.logging.trace_frames)?
            .set_default(
                "logging.include_location",
                defaults.logging.include_location,
            )?
            .set_default("logging.thread_ids", defaults.logging.thread_ids)?
            .set_default("logging.thread_names", defaults.logging.thread_names)?;

        let config = builder
            // Load default config file
            .add_source(
                File::new(&format!("{}/default", Self::CONFIG_DIR), FileFormat::Yaml)
                    .required(false),
            )
            // Load local overrides
            .add_source(
                File::new(&format!("{}/local", Self::CONFIG_DIR), FileFormat::Yaml).required(false),
            )
            // Add environment variables
            .add_source(
                Environment::with_prefix(Self::ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config = config.try_deserialize()?;
        Self::validate(&config)?;

        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix(Self::ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config = config.try_deserialize()?;
        Self::validate(&config)?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(config: &Self) -> Result<(), ConfigError> {
        fn validation_error(msg: &str) -> ConfigError {
            ConfigError::Message(msg.to_string())
        }

        if config.serial.device.is_empty() {
            return Err(validation_error("Serial device must not be empty"));
        }
        if config.serial.baud_rate == 0 {
            return Err(validation_error("Baud rate must be non-zero"));
        }
        if config.device.mode == TransmissionMode::Rtu && config.serial.data_bits.get() != 8 {
            return Err(validation_error("RTU mode requires 8 data bits"));
        }
        if config.device.char_time_prescaler == 0 {
            return Err(validation_error(
                "Character time prescaler must be non-zero",
            ));
        }

        if config.master.request_timeout.is_zero() {
            return Err(validation_error("Request timeout must be non-zero"));
        }
        if config.master.buffer_size == 0 {
            return Err(validation_error("Master buffer size must be non-zero"));
        }

        if config.slave.address > MAX_UNIT_ADDRESS {
            return Err(validation_error("Slave address must lie in 0..=247"));
        }
        if config.slave.poll_timeout.is_zero() {
            return Err(validation_error("Poll timeout must be non-zero"));
        }
        if config.slave.buffer_size == 0 {
            return Err(validation_error("Slave buffer size must be non-zero"));
        }

        config
            .logging
            .validate()
            .map_err(|e| validation_error(&e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, time::Duration};
    use tempfile::tempdir;

    #[test]
    #[serial_test::serial]
    fn test_default_config() {
        let config = Config::new().unwrap();
        assert_eq!(config.serial.baud_rate, 19_200);
        assert_eq!(config.device.mode, TransmissionMode::Rtu);
        assert_eq!(config.slave.address, 1);
    }

    #[test]
    #[serial_test::serial]
    fn test_env_override() {
        std::env::set_var("MODBUS_SERIAL_SLAVE__ADDRESS", "17");
        let config = Config::new().unwrap();
        assert_eq!(config.slave.address, 17);
        std::env::remove_var("MODBUS_SERIAL_SLAVE__ADDRESS");
    }

    #[test]
    #[serial_test::serial]
    fn test_file_config() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");

        fs::write(
            &config_path,
            r#"
            serial:
              device: "/dev/ttyAMA0"
              baud_rate: 9600
              data_bits: 8
              parity: "none"
              stop_bits: "two"
            device:
              mode: "ascii"
              ascii_line_feed: 10
              char_time_prescaler: 2
            master:
              turnaround_delay: "200ms"
              request_timeout: "2s"
              buffer_size: 256
            slave:
              address: 5
              listen_only: false
              delay_before_reply: "10ms"
              poll_timeout: "500ms"
              buffer_size: 256
            logging:
              level: "debug"
              format: "pretty"
              trace_frames: true
              include_location: false
              thread_ids: false
              thread_names: true
            "#,
        )
        .unwrap();

        let config = Config::from_file(config_path).unwrap();
        assert_eq!(config.serial.device, "/dev/ttyAMA0");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.device.mode, TransmissionMode::Ascii);
        assert_eq!(config.device.char_time_prescaler, 2);
        assert_eq!(config.master.turnaround_delay, Duration::from_millis(200));
        assert_eq!(config.master.request_timeout, Duration::from_secs(2));
        assert_eq!(config.slave.address, 5);
        assert_eq!(config.slave.delay_before_reply, Duration::from_millis(10));
        assert_eq!(config.slave.poll_timeout, Duration::from_millis(500));
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.trace_frames);
    }

    #[test]
    #[serial_test::serial]
    fn test_validation() {
        std::env::set_var("MODBUS_SERIAL_SLAVE__ADDRESS", "250");
        assert!(Config::new().is_err());
        std::env::remove_var("MODBUS_SERIAL_SLAVE__ADDRESS");
    }

    #[test]
    #[serial_test::serial]
    fn test_rtu_requires_eight_data_bits() {
        std::env::set_var("MODBUS_SERIAL_SERIAL__DATA_BITS", "7");
        assert!(Config::new().is_err());
        std::env::remove_var("MODBUS_SERIAL_SERIAL__DATA_BITS");
    }
}
