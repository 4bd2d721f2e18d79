pub mod config;
pub mod driver;
pub mod errors;
pub mod frame;
pub mod logging;
pub mod master;
pub mod server;
pub mod slave;
pub mod transport;

pub use config::{DataBits, Parity, StopBits, TransmissionMode};
pub use config::{
    DeviceConfig, LoggingConfig, MasterConfig, SerialConfig, SlaveConfig, StackConfig,
};
pub use errors::{
    CodecError, ConfigValidationError, DeviceError, DriverError, MasterError, SlaveError,
    StackError, TransportError,
};
pub use frame::{Frame, FrameFlags};
pub use logging::setup_logging;
pub use master::Master;
pub use server::SlaveServer;
pub use slave::{CommandTable, DataModel, MemoryModel, Slave};
pub use transport::{Direction, Iface, SerialDriver, Transport};
