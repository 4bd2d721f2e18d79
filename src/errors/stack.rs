use thiserror::Error;

use super::{
    CodecError, ConfigValidationError, DeviceError, DriverError, InitializationError, MasterError,
    SlaveError, TransportError,
};

/// Top-level error type aggregating every area of the stack.
#[derive(Error, Debug)]
pub enum StackError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Master error: {0}")]
    Master(#[from] MasterError),

    #[error("Slave error: {0}")]
    Slave(#[from] SlaveError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigValidationError),

    #[error("Initialization error: {0}")]
    Init(#[from] InitializationError),
}

impl From<config::ConfigError> for StackError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(ConfigValidationError::from(err))
    }
}
