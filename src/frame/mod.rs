mod ascii;
mod crc16;
mod emitter;
mod fetcher;
mod lrc;
mod rtu;

pub use ascii::{AsciiFrameDecoder, AsciiFrameEncoder};
pub use crc16::Crc16;
pub use emitter::BufferEmitter;
pub use fetcher::BufferFetcher;
pub use lrc::Lrc;
pub use rtu::{RtuFrameDecoder, RtuFrameEncoder};

/// Broadcast unit address. Requests sent to it are executed by every slave
/// and acknowledged by none.
pub const BROADCAST_ADDRESS: u8 = 0;

/// Highest unit address assignable to a slave (248-255 are reserved).
pub const MAX_UNIT_ADDRESS: u8 = 247;

/// Highest valid function code on the wire (codes above carry the
/// exception bit).
pub const MAX_FUNCTION_CODE: u8 = 0x7F;

/// Maximum size of a serial ADU (address + function code + data + checksum).
pub const MAX_ADU_SIZE: usize = 256;

/// Maximum data field length of an RTU ADU (address, function code and the
/// two CRC bytes subtracted from [`MAX_ADU_SIZE`]).
pub const MAX_RTU_DATA_SIZE: usize = MAX_ADU_SIZE - 4;

/// Public function codes implemented by the built-in catalog.
pub mod function_codes {
    pub const READ_COILS: u8 = 0x01;
    pub const READ_DISCRETE_INPUTS: u8 = 0x02;
    pub const READ_HOLDING_REGISTERS: u8 = 0x03;
    pub const READ_INPUT_REGISTERS: u8 = 0x04;
    pub const WRITE_SINGLE_COIL: u8 = 0x05;
    pub const WRITE_SINGLE_REGISTER: u8 = 0x06;
    pub const WRITE_MULTIPLE_COILS: u8 = 0x0F;
    pub const WRITE_MULTIPLE_REGISTERS: u8 = 0x10;
    pub const MASK_WRITE_REGISTER: u8 = 0x16;
    pub const READ_WRITE_MULTIPLE_REGISTERS: u8 = 0x17;
}

/// Quantity limits and value encodings shared by the master cmdlets and the
/// slave command handlers.
pub mod limits {
    /// Read Coils / Read Discrete Inputs quantity bound.
    pub const MAX_READ_BITS: u16 = 2000;
    /// Read Holding/Input Registers quantity bound.
    pub const MAX_READ_REGISTERS: u16 = 125;
    /// Write Multiple Coils quantity bound.
    pub const MAX_WRITE_BITS: u16 = 1968;
    /// Write Multiple Registers quantity bound.
    pub const MAX_WRITE_REGISTERS: u16 = 123;
    /// Read side of Read/Write Multiple Registers.
    pub const MAX_RW_READ_REGISTERS: u16 = 125;
    /// Write side of Read/Write Multiple Registers.
    pub const MAX_RW_WRITE_REGISTERS: u16 = 121;

    /// Wire encodings of a single coil value (function code 0x05).
    pub const COIL_ON: u16 = 0xFF00;
    pub const COIL_OFF: u16 = 0x0000;

    /// Number of packed bytes carrying `quantity` bits.
    pub fn bit_byte_count(quantity: u16) -> usize {
        (quantity as usize + 7) / 8
    }
}

/// Modbus exception codes carried in exception responses.
pub mod exception_codes {
    pub const ILLEGAL_FUNCTION: u8 = 0x01;
    pub const ILLEGAL_DATA_ADDRESS: u8 = 0x02;
    pub const ILLEGAL_DATA_VALUE: u8 = 0x03;
    pub const SERVER_DEVICE_FAILURE: u8 = 0x04;
}

/// A Modbus ADU minus its checksum: unit address, function code and the
/// data field. The frame is a view; the bytes belong to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub address: u8,
    pub function_code: u8,
    pub data: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn new(address: u8, function_code: u8, data: &'a [u8]) -> Self {
        Self {
            address,
            function_code,
            data,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.address == BROADCAST_ADDRESS
    }

    /// Whether this frame is an exception response (function code with the
    /// 0x80 bit set on top of a valid request code).
    pub fn is_exception(&self) -> bool {
        self.function_code > 0x80
    }

    /// The exception code of an exception response, if present.
    pub fn exception_code(&self) -> Option<u8> {
        if self.is_exception() {
            self.data.first().copied()
        } else {
            None
        }
    }
}

/// Anomaly bits attached to every received frame.
///
/// `DROP` is set whenever any semantics-breaking condition was observed;
/// consumers must not act on a frame carrying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameFlags(u16);

impl FrameFlags {
    /// The frame must not be acted on.
    pub const DROP: FrameFlags = FrameFlags(1 << 0);
    /// The data buffer was too small to hold the frame data.
    pub const BUFFER_OVERFLOW: FrameFlags = FrameFlags(1 << 1);
    /// The received CRC/LRC did not match the computed one.
    pub const CHECKSUM_MISMATCH: FrameFlags = FrameFlags(1 << 2);
    /// The stream ended before the checksum could be verified.
    pub const TRUNCATED: FrameFlags = FrameFlags(1 << 3);
    /// The UART reported a parity error while receiving.
    pub const PARITY_ERROR: FrameFlags = FrameFlags(1 << 4);
    /// The UART or the RX latch reported a data overrun.
    pub const OVERRUN_ERROR: FrameFlags = FrameFlags(1 << 5);
    /// The UART reported a framing error.
    pub const FRAME_ERROR: FrameFlags = FrameFlags(1 << 6);
    /// RTU: one or more bytes arrived after the 1.5-character gap.
    pub const REDUNDANT_BYTE: FrameFlags = FrameFlags(1 << 7);
    /// ASCII: a non-hex character occupied a hex position.
    pub const INVALID_BYTE: FrameFlags = FrameFlags(1 << 8);

    pub const fn empty() -> Self {
        FrameFlags(0)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: FrameFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: FrameFlags) {
        self.0 |= other.0;
    }

    /// Shorthand for the mandatory drop check.
    pub fn is_drop(self) -> bool {
        self.contains(FrameFlags::DROP)
    }
}

impl std::ops::BitOr for FrameFlags {
    type Output = FrameFlags;

    fn bitor(self, rhs: FrameFlags) -> FrameFlags {
        FrameFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for FrameFlags {
    fn bitor_assign(&mut self, rhs: FrameFlags) {
        self.0 |= rhs.0;
    }
}

impl std::fmt::Display for FrameFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }

        const NAMES: [(FrameFlags, &str); 9] = [
            (FrameFlags::DROP, "drop"),
            (FrameFlags::BUFFER_OVERFLOW, "buffer-overflow"),
            (FrameFlags::CHECKSUM_MISMATCH, "checksum-mismatch"),
            (FrameFlags::TRUNCATED, "truncated"),
            (FrameFlags::PARITY_ERROR, "parity-error"),
            (FrameFlags::OVERRUN_ERROR, "overrun-error"),
            (FrameFlags::FRAME_ERROR, "frame-error"),
            (FrameFlags::REDUNDANT_BYTE, "redundant-byte"),
            (FrameFlags::INVALID_BYTE, "invalid-byte"),
        ];

        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        Ok(())
    }
}
