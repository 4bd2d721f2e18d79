use thiserror::Error;

/// Configuration loading and validation failures.
#[derive(Error, Debug)]
pub enum ConfigValidationError {
    #[error("Serial configuration error: {0}")]
    Serial(String),

    #[error("Device configuration error: {0}")]
    Device(String),

    #[error("Master configuration error: {0}")]
    Master(String),

    #[error("Slave configuration error: {0}")]
    Slave(String),

    #[error("Logging configuration error: {0}")]
    Logging(String),

    #[error("Configuration error: {0}")]
    Other(String),
}

impl ConfigValidationError {
    pub fn serial(details: impl Into<String>) -> Self {
        Self::Serial(details.into())
    }

    pub fn device(details: impl Into<String>) -> Self {
        Self::Device(details.into())
    }

    pub fn master(details: impl Into<String>) -> Self {
        Self::Master(details.into())
    }

    pub fn slave(details: impl Into<String>) -> Self {
        Self::Slave(details.into())
    }

    pub fn logging(details: impl Into<String>) -> Self {
        Self::Logging(details.into())
    }
}

impl From<config::ConfigError> for ConfigValidationError {
    fn from(err: config::ConfigError) -> Self {
        Self::Other(err.to_string())
    }
}
