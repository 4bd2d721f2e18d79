use thiserror::Error;

use super::{CodecError, DeviceError, DriverError};

/// Failures of the transport RX/TX paths.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The caller-supplied timeout elapsed before a frame arrived.
    #[error("Timed out waiting for the serial line")]
    Timeout,

    /// The RX admission counter is saturated (nested receive calls).
    #[error("Too many receive requests in progress")]
    RxTooMany,

    /// The TX admission counter is saturated (nested transmit calls).
    #[error("Too many transmit requests in progress")]
    TxTooMany,
}
