use crate::errors::CodecError;

use super::{Crc16, Frame, FrameFlags};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    Address,
    FunctionCode,
    CrcHi,
    CrcLo,
    Data,
    End,
}

/// Byte-at-a-time Modbus RTU frame decoder.
///
/// The serial line gives no length prefix, so the decoder keeps the last two
/// received bytes in a trailing window (`crc_lo`, `crc_hi`). Every byte past
/// the function code first lands in the window; the byte it displaces is the
/// one that is certainly payload and gets appended to the data buffer and
/// fed to the CRC. When the stream ends, the window holds exactly the
/// received checksum.
///
/// Anomalies never abort decoding; they accumulate in [`FrameFlags`] so the
/// transport can keep consuming the line until silence.
#[derive(Debug)]
pub struct RtuFrameDecoder<'a> {
    state: DecoderState,
    address: u8,
    function_code: u8,
    buffer: &'a mut [u8],
    written: usize,
    crc_hi: u8,
    crc_lo: u8,
    crc: Crc16,
    flags: FrameFlags,
}

impl<'a> RtuFrameDecoder<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            state: DecoderState::Address,
            address: 0,
            function_code: 0,
            buffer,
            written: 0,
            crc_hi: 0,
            crc_lo: 0,
            crc: Crc16::new(),
            flags: FrameFlags::empty(),
        }
    }

    /// Feed one received byte into the decoder.
    pub fn update(&mut self, datum: u8) {
        match self.state {
            DecoderState::Address => {
                self.crc.update(datum);
                self.address = datum;
                self.state = DecoderState::FunctionCode;
            }
            DecoderState::FunctionCode => {
                self.crc.update(datum);
                self.function_code = datum;
                self.state = DecoderState::CrcHi;
            }
            DecoderState::CrcHi => {
                self.crc_hi = datum;
                self.state = DecoderState::CrcLo;
            }
            DecoderState::CrcLo => {
                self.crc_lo = self.crc_hi;
                self.crc_hi = datum;
                self.state = DecoderState::Data;
            }
            DecoderState::Data => {
                // The oldest byte of the trailing window is now known to be
                // payload, not checksum.
                let databyte = self.crc_lo;
                if self.written == self.buffer.len() {
                    self.flags
                        .insert(FrameFlags::DROP | FrameFlags::BUFFER_OVERFLOW);
                } else {
                    self.buffer[self.written] = databyte;
                    self.written += 1;
                }
                self.crc.update(databyte);
                self.crc_lo = self.crc_hi;
                self.crc_hi = datum;
            }
            DecoderState::End => {
                self.flags
                    .insert(FrameFlags::DROP | FrameFlags::REDUNDANT_BYTE);
            }
        }
    }

    /// Close the decoder at end-of-frame (the 1.5-character silence).
    ///
    /// A stream shorter than four bytes cannot carry a verifiable checksum
    /// and is marked truncated.
    pub fn end(&mut self) -> Result<(), CodecError> {
        match self.state {
            DecoderState::Address
            | DecoderState::FunctionCode
            | DecoderState::CrcHi
            | DecoderState::CrcLo => {
                self.flags.insert(
                    FrameFlags::DROP | FrameFlags::TRUNCATED | FrameFlags::CHECKSUM_MISMATCH,
                );
            }
            DecoderState::Data => {
                let (real_hi, real_lo) = Crc16::hi_lo(self.crc.finalize());
                if real_lo != self.crc_lo || real_hi != self.crc_hi {
                    self.flags
                        .insert(FrameFlags::DROP | FrameFlags::CHECKSUM_MISMATCH);
                }
            }
            DecoderState::End => return Err(CodecError::DecoderInvalidState),
        }
        self.state = DecoderState::End;
        Ok(())
    }

    /// Extract the decoded frame and its flags. Valid only after [`end`].
    ///
    /// [`end`]: RtuFrameDecoder::end
    pub fn into_frame(self) -> Result<(Frame<'a>, FrameFlags), CodecError> {
        if self.state != DecoderState::End {
            return Err(CodecError::DecoderInvalidState);
        }
        let buffer: &'a mut [u8] = self.buffer;
        let data: &'a [u8] = &buffer[..self.written];
        Ok((
            Frame::new(self.address, self.function_code, data),
            self.flags,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EncoderState {
    Address,
    FunctionCode,
    Data,
    CrcLo,
    CrcHi,
    End,
}

/// Pull-style Modbus RTU frame encoder.
///
/// `next()` hands out one wire byte at a time so the transmit path can wait
/// for each TX-complete event in between; the CRC is folded in as the
/// logical bytes stream out.
#[derive(Debug)]
pub struct RtuFrameEncoder<'a> {
    frame: Frame<'a>,
    state: EncoderState,
    index: usize,
    crc: Crc16,
    crc_value: u16,
}

impl<'a> RtuFrameEncoder<'a> {
    pub fn new(frame: Frame<'a>) -> Self {
        Self {
            frame,
            state: EncoderState::Address,
            index: 0,
            crc: Crc16::new(),
            crc_value: 0,
        }
    }

    pub fn has_next(&self) -> bool {
        self.state != EncoderState::End
    }

    /// Produce the next byte to put on the wire.
    pub fn next(&mut self) -> Result<u8, CodecError> {
        let datum = match self.state {
            EncoderState::Address => {
                self.crc.update(self.frame.address);
                self.state = EncoderState::FunctionCode;
                self.frame.address
            }
            EncoderState::FunctionCode => {
                self.crc.update(self.frame.function_code);
                self.state = if self.frame.data.is_empty() {
                    EncoderState::CrcLo
                } else {
                    EncoderState::Data
                };
                self.frame.function_code
            }
            EncoderState::Data => {
                let datum = self.frame.data[self.index];
                self.crc.update(datum);
                self.index += 1;
                if self.index == self.frame.data.len() {
                    self.state = EncoderState::CrcLo;
                }
                datum
            }
            EncoderState::CrcLo => {
                self.crc_value = self.crc.finalize();
                self.state = EncoderState::CrcHi;
                (self.crc_value & 0x00FF) as u8
            }
            EncoderState::CrcHi => {
                self.state = EncoderState::End;
                (self.crc_value >> 8) as u8
            }
            EncoderState::End => return Err(CodecError::FrameEnd),
        };
        Ok(datum)
    }
}
