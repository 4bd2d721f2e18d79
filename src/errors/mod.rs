mod codec;
mod config;
mod device;
mod driver;
mod init;
mod master;
mod slave;
mod stack;
mod transport;

pub use codec::CodecError;
pub use config::ConfigValidationError;
pub use device::DeviceError;
pub use driver::DriverError;
pub use init::InitializationError;
pub use master::MasterError;
pub use slave::SlaveError;
pub use stack::StackError;
pub use transport::TransportError;
