use thiserror::Error;

/// Device registry and lifecycle failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The interface index is outside the registry bounds.
    #[error("Interface {0} does not exist")]
    NotExist(usize),

    /// The registry slot holds no device.
    #[error("Interface {0} is not registered")]
    NotRegistered(usize),

    #[error("Interface {0} is not opened")]
    NotOpened(usize),

    #[error("Interface {0} is already opened")]
    AlreadyOpened(usize),

    /// The registry has no free slot left.
    #[error("No free interface slot (capacity {0})")]
    NoFreeSlot(usize),

    /// The operation requires the device to be idle, but an RX or TX call
    /// is in progress.
    #[error("Interface {0} is busy")]
    Busy(usize),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(&'static str),
}
