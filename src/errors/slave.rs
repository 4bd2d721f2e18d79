use thiserror::Error;

use super::{CodecError, TransportError};

/// Failures of the slave poll engine, its command table and its handlers.
#[derive(Error, Debug)]
pub enum SlaveError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Another poll is already in flight on this slave.
    #[error("Slave is still polling")]
    StillPolling,

    #[error("Listen-only mode already entered")]
    ListenOnlyAlreadyEntered,

    #[error("Listen-only mode already exited")]
    ListenOnlyAlreadyExited,

    /// Function codes must lie in 1..=127.
    #[error("Invalid function code {0:#04x}")]
    InvalidFunctionCode(u8),

    #[error("Function code {0:#04x} is already registered")]
    FunctionCodeExists(u8),

    #[error("Command table is full (capacity {0})")]
    TableFull(usize),

    /// The request frame ended before all expected fields were read.
    #[error("Request frame is truncated")]
    RequestTruncated,

    /// The reply buffer is too small for the response being built.
    #[error("Response buffer too small for the reply")]
    ResponseTruncated,

    /// A caller-supplied data model operation reported a failure.
    #[error("Data model callback failed: {0}")]
    Callback(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<CodecError> for SlaveError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::BufferEnd => SlaveError::RequestTruncated,
            other => SlaveError::Transport(TransportError::Codec(other)),
        }
    }
}
