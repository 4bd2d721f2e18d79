mod device;
mod logging;
mod master;
mod serial;
mod slave;
mod stack;
mod types;

pub use device::Config as DeviceConfig;
pub use logging::Config as LoggingConfig;
pub use master::Config as MasterConfig;
pub use serial::Config as SerialConfig;
pub use slave::Config as SlaveConfig;
pub use stack::Config as StackConfig;
pub use types::{DataBits, Parity, StopBits, TransmissionMode};
