use thiserror::Error;

use super::{CodecError, TransportError};

/// Failures of the master transaction engine and its cmdlets.
#[derive(Error, Debug)]
pub enum MasterError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Another transaction is already in flight on this master.
    #[error("Master is still busy with another transaction")]
    StillBusy,

    /// The request parameters violate the function code's limits.
    #[error("Bad request: {0}")]
    BadRequest(&'static str),

    /// The shared TX/RX buffer is too small for the request.
    #[error("Transmit buffer too small for the request")]
    BufferLow,

    /// The response frame ended before all expected fields were read.
    #[error("Response frame is truncated")]
    ResponseTruncated,

    /// A response field held a value that contradicts the request (byte
    /// count, echoed parameters).
    #[error("Invalid response format: {0}")]
    InvalidFormat(&'static str),

    /// The response came from a different slave; the transaction loop
    /// treats this as "not for us" and keeps waiting.
    #[error("Response from an unexpected slave")]
    InvalidSlave,

    /// The response function code matches neither the request nor its
    /// exception form.
    #[error("Unexpected response function code")]
    InvalidFunctionCode,

    /// A caller-supplied response sink reported a failure.
    #[error("Response callback failed: {0}")]
    Callback(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<CodecError> for MasterError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::BufferEnd => MasterError::ResponseTruncated,
            other => MasterError::Transport(TransportError::Codec(other)),
        }
    }
}
