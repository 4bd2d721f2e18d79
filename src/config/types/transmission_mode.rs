use serde::{Deserialize, Serialize};

/// Serial-line transmission mode of a Modbus device.
///
/// RTU is the binary framing with CRC-16 and character-time gaps; ASCII is
/// the colon-delimited hex framing with LRC and CR/LF termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransmissionMode {
    Rtu,
    Ascii,
}

impl Default for TransmissionMode {
    fn default() -> Self {
        Self::Rtu
    }
}

impl std::fmt::Display for TransmissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransmissionMode::Rtu => write!(f, "rtu"),
            TransmissionMode::Ascii => write!(f, "ascii"),
        }
    }
}
