use thiserror::Error;

/// Failures while bringing the process up (logging, service wiring).
#[derive(Error, Debug)]
pub enum InitializationError {
    #[error("Logging initialization failed: {0}")]
    Logging(String),

    #[error("Service initialization failed: {0}")]
    Service(String),
}

impl InitializationError {
    pub fn logging(details: impl Into<String>) -> Self {
        Self::Logging(details.into())
    }

    pub fn service(details: impl Into<String>) -> Self {
        Self::Service(details.into())
    }
}
