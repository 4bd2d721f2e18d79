mod data_bits;
mod parity;
mod stop_bits;
mod transmission_mode;

pub use data_bits::DataBits;
pub use parity::Parity;
pub use stop_bits::StopBits;
pub use transmission_mode::TransmissionMode;
