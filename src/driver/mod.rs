mod loopback;
mod serial;

pub use loopback::LoopbackDriver;
pub use serial::SerialPortDriver;
