use thiserror::Error;

/// Failures surfaced by a driver behind the
/// [`SerialDriver`](crate::transport::SerialDriver) capability set.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A capability was invoked before `open` (or after `close`).
    #[error("Driver is not open")]
    NotOpen,

    /// The other end of a linked driver pair is gone.
    #[error("Peer endpoint disconnected")]
    Disconnected,

    /// There is no received byte to read.
    #[error("RX data register is empty")]
    RxEmpty,
}
