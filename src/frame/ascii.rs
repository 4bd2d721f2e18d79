use crate::errors::CodecError;

use super::{Frame, FrameFlags, Lrc};

const ASCII_COLON: u8 = b':';
const ASCII_CR: u8 = b'\r';

fn decode_hex_char(ch: u8) -> Result<u8, CodecError> {
    match ch {
        b'0'..=b'9' => Ok(ch - b'0'),
        // Uppercase only, per the Modbus ASCII specification.
        b'A'..=b'F' => Ok(ch - b'A' + 10),
        _ => Err(CodecError::InvalidChar),
    }
}

fn encode_hex_nibble(nibble: u8) -> u8 {
    if nibble <= 9 {
        b'0' + nibble
    } else {
        b'A' + (nibble - 10)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    AddressHi,
    AddressLo,
    FunctionCodeHi,
    FunctionCodeLo,
    LrcHi,
    LrcLo,
    DataHi,
    DataLo,
    End,
}

/// Character-at-a-time Modbus ASCII frame decoder.
///
/// Operates on the payload between the framing colon and the trailing
/// CR/LF, which the transport strips before feeding characters here. Each
/// hex pair folds into one logical byte; the third byte onwards flows
/// through a one-byte trailing window (the `lrc` slot) so that when the
/// stream ends, the window holds the received LRC and everything displaced
/// from it landed in the data buffer.
///
/// An invalid character decodes as 0x00 and sets `INVALID_BYTE | DROP`, but
/// decoding continues so the LRC window stays aligned with the stream.
#[derive(Debug)]
pub struct AsciiFrameDecoder<'a> {
    state: DecoderState,
    partial: u8,
    address: u8,
    function_code: u8,
    buffer: &'a mut [u8],
    written: usize,
    lrc: u8,
    lrc_ctx: Lrc,
    flags: FrameFlags,
}

impl<'a> AsciiFrameDecoder<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            state: DecoderState::AddressHi,
            partial: 0,
            address: 0,
            function_code: 0,
            buffer,
            written: 0,
            lrc: 0,
            lrc_ctx: Lrc::new(),
            flags: FrameFlags::empty(),
        }
    }

    /// Return the decoder to its initial state over the same buffer. Used
    /// when a peer re-synchronizes with a fresh colon mid-frame.
    pub fn reset(&mut self) {
        self.state = DecoderState::AddressHi;
        self.partial = 0;
        self.address = 0;
        self.function_code = 0;
        self.written = 0;
        self.lrc = 0;
        self.lrc_ctx = Lrc::new();
        self.flags = FrameFlags::empty();
    }

    fn decode_pair(&mut self, lo_char: u8) -> u8 {
        let hi = decode_hex_char(self.partial);
        let lo = decode_hex_char(lo_char);
        match (hi, lo) {
            (Ok(hi), Ok(lo)) => (hi << 4) | lo,
            _ => {
                self.flags
                    .insert(FrameFlags::DROP | FrameFlags::INVALID_BYTE);
                0x00
            }
        }
    }

    /// Feed one received character into the decoder.
    pub fn update(&mut self, datum: u8) {
        match self.state {
            DecoderState::AddressHi => {
                self.partial = datum;
                self.state = DecoderState::AddressLo;
            }
            DecoderState::AddressLo => {
                let byte = self.decode_pair(datum);
                self.lrc_ctx.update(byte);
                self.address = byte;
                self.state = DecoderState::FunctionCodeHi;
            }
            DecoderState::FunctionCodeHi => {
                self.partial = datum;
                self.state = DecoderState::FunctionCodeLo;
            }
            DecoderState::FunctionCodeLo => {
                let byte = self.decode_pair(datum);
                self.lrc_ctx.update(byte);
                self.function_code = byte;
                self.state = DecoderState::LrcHi;
            }
            DecoderState::LrcHi => {
                self.partial = datum;
                self.state = DecoderState::LrcLo;
            }
            DecoderState::LrcLo => {
                // First occupant of the trailing window; not folded into the
                // running LRC unless a later byte displaces it.
                self.lrc = self.decode_pair(datum);
                self.state = DecoderState::DataHi;
            }
            DecoderState::DataHi => {
                self.partial = datum;
                self.state = DecoderState::DataLo;
            }
            DecoderState::DataLo => {
                let byte = self.decode_pair(datum);
                let databyte = self.lrc;
                if self.written == self.buffer.len() {
                    self.flags
                        .insert(FrameFlags::DROP | FrameFlags::BUFFER_OVERFLOW);
                } else {
                    self.buffer[self.written] = databyte;
                    self.written += 1;
                }
                self.lrc_ctx.update(databyte);
                self.lrc = byte;
                self.state = DecoderState::DataHi;
            }
            DecoderState::End => {
                self.flags
                    .insert(FrameFlags::DROP | FrameFlags::REDUNDANT_BYTE);
            }
        }
    }

    /// Close the decoder at end-of-frame (the CR character).
    ///
    /// Ending anywhere except on a byte boundary past the LRC slot means the
    /// frame is truncated and the checksum unverifiable.
    pub fn end(&mut self) -> Result<(), CodecError> {
        match self.state {
            DecoderState::DataHi => {
                if self.lrc_ctx.finalize() != self.lrc {
                    self.flags
                        .insert(FrameFlags::DROP | FrameFlags::CHECKSUM_MISMATCH);
                }
            }
            DecoderState::End => return Err(CodecError::DecoderInvalidState),
            _ => {
                self.flags.insert(
                    FrameFlags::DROP | FrameFlags::TRUNCATED | FrameFlags::CHECKSUM_MISMATCH,
                );
            }
        }
        self.state = DecoderState::End;
        Ok(())
    }

    /// Extract the decoded frame and its flags. Valid only after [`end`].
    ///
    /// [`end`]: AsciiFrameDecoder::end
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
    Start,
    AddressHi,
    AddressLo,
    FunctionCodeHi,
    FunctionCodeLo,
    DataHi,
    DataLo,
    LrcHi,
    LrcLo,
    Cr,
    Lf,
    End,
}

/// Pull-style Modbus ASCII frame encoder.
///
/// Emits the framing colon, each logical byte as two uppercase hex
/// characters (the second handed out of the `partial` latch), the LRC, and
/// the CR/LF trailer. The line-feed character is configurable because some
/// peers deviate from 0x0A.
#[derive(Debug)]
pub struct AsciiFrameEncoder<'a> {
    frame: Frame<'a>,
    state: EncoderState,
    index: usize,
    partial: u8,
    line_feed: u8,
    lrc_ctx: Lrc,
}

impl<'a> AsciiFrameEncoder<'a> {
    pub fn new(frame: Frame<'a>, line_feed: u8) -> Self {
        Self {
            frame,
            state: EncoderState::Start,
            index: 0,
            partial: 0,
            line_feed,
            lrc_ctx: Lrc::new(),
        }
    }

    fn begin_byte(&mut self, byte: u8) -> u8 {
        self.lrc_ctx.update(byte);
        self.partial = encode_hex_nibble(byte & 0x0F);
        encode_hex_nibble(byte >> 4)
    }

    pub fn has_next(&self) -> bool {
        self.state != EncoderState::End
    }

    /// Produce the next character to put on the wire.
    pub fn next(&mut self) -> Result<u8, CodecError> {
        let datum = match self.state {
            EncoderState::Start => {
                self.state = EncoderState::AddressHi;
                ASCII_COLON
            }
            EncoderState::AddressHi => {
                self.state = EncoderState::AddressLo;
                let address = self.frame.address;
                self.begin_byte(address)
            }
            EncoderState::AddressLo => {
                self.state = EncoderState::FunctionCodeHi;
                self.partial
            }
            EncoderState::FunctionCodeHi => {
                self.state = EncoderState::FunctionCodeLo;
                let function_code = self.frame.function_code;
                self.begin_byte(function_code)
            }
            EncoderState::FunctionCodeLo => {
                self.state = if self.frame.data.is_empty() {
                    EncoderState::LrcHi
                } else {
                    EncoderState::DataHi
                };
                self.partial
            }
            EncoderState::DataHi => {
                self.state = EncoderState::DataLo;
                let byte = self.frame.data[self.index];
                self.begin_byte(byte)
            }
            EncoderState::DataLo => {
                self.index += 1;
                self.state = if self.index == self.frame.data.len() {
                    EncoderState::LrcHi
                } else {
                    EncoderState::DataHi
                };
                self.partial
            }
            EncoderState::LrcHi => {
                let lrc = self.lrc_ctx.finalize();
                let (hi, lo) = Lrc::hi_lo(lrc);
                self.partial = encode_hex_nibble(lo);
                self.state = EncoderState::LrcLo;
                encode_hex_nibble(hi)
            }
            EncoderState::LrcLo => {
                self.state = EncoderState::Cr;
                self.partial
            }
            EncoderState::Cr => {
                self.state = EncoderState::Lf;
                ASCII_CR
            }
            EncoderState::Lf => {
                self.state = EncoderState::End;
                self.line_feed
            }
            EncoderState::End => return Err(CodecError::FrameEnd),
        };
        Ok(datum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LF: u8 = 0x0A;

    fn encode(frame: Frame<'_>, line_feed: u8) -> Vec<u8> {
        let mut encoder = AsciiFrameEncoder::new(frame, line_feed);
        let mut wire = Vec::new();
        while encoder.has_next() {
            wire.push(encoder.next().unwrap());
        }
        wire
    }

    fn decode(payload: &[u8], buffer: &mut [u8]) -> (u8, u8, Vec<u8>, FrameFlags) {
        let mut decoder = AsciiFrameDecoder::new(buffer);
        for &ch in payload {
            decoder.update(ch);
        }
        decoder.end().unwrap();
        let (frame, flags) = decoder.into_frame().unwrap();
        (
            frame.address,
            frame.function_code,
            frame.data.to_vec(),
            flags,
        )
    }

    #[test]
    fn test_decode_write_single_coil() {
        // ':010500ACFF004F\r\n' with framing characters stripped.
        let mut buf = [0u8; 16];
        let (address, function_code, data, flags) = decode(b"010500ACFF004F", &mut buf);
        assert_eq!(address, 0x01);
        assert_eq!(function_code, 0x05);
        assert_eq!(data, [0x00, 0xAC, 0xFF, 0x00]);
        assert!(flags.is_empty());
    }

    #[test]
    fn test_encode_write_single_coil() {
        let wire = encode(Frame::new(0x01, 0x05, &[0x00, 0xAC, 0xFF, 0x00]), LF);
        assert_eq!(wire, b":010500ACFF004F\r\n");
    }

    #[test]
    fn test_configurable_line_feed() {
        let wire = encode(Frame::new(0x01, 0x05, &[0x00, 0xAC, 0xFF, 0x00]), b'#');
        assert_eq!(wire.last(), Some(&b'#'));
    }

    #[test]
    fn test_minimal_frame() {
        // Just address, function code and LRC: ':1108E7\r\n' stripped.
        let wire = encode(Frame::new(0x11, 0x08, &[]), LF);
        let payload = &wire[1..wire.len() - 2];

        let mut buf = [0u8; 16];
        let (address, function_code, data, flags) = decode(payload, &mut buf);
        assert_eq!(address, 0x11);
        assert_eq!(function_code, 0x08);
        assert!(data.is_empty());
        assert!(flags.is_empty());
    }

    #[test]
    fn test_round_trip_various_lengths() {
        for len in [1usize, 2, 5, 64] {
            let payload: Vec<u8> = (0..len).map(|i| (i * 53 + 11) as u8).collect();
            let wire = encode(Frame::new(0x0A, 0x10, &payload), LF);
            let stripped = &wire[1..wire.len() - 2];

            let mut buf = [0u8; 64];
            let (address, function_code, data, flags) = decode(stripped, &mut buf);
            assert_eq!(address, 0x0A);
            assert_eq!(function_code, 0x10);
            assert_eq!(data, payload, "payload length {}", len);
            assert!(flags.is_empty(), "payload length {}", len);
        }
    }

    #[test]
    fn test_invalid_character_keeps_decoding() {
        // A non-hex character decodes as 0x00 and the stream stays aligned.
        let mut buf = [0u8; 16];
        let mut decoder = AsciiFrameDecoder::new(&mut buf);
        for &ch in b"01xx00ACFF004F".iter() {
            decoder.update(ch);
        }
        decoder.end().unwrap();
        let (frame, flags) = decoder.into_frame().unwrap();

        assert!(flags.contains(FrameFlags::DROP | FrameFlags::INVALID_BYTE));
        assert_eq!(frame.function_code, 0x00);
        assert_eq!(frame.data, [0x00, 0xAC, 0xFF, 0x00]);
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut buf = [0u8; 16];
        let (_, _, _, flags) = decode(b"010500ACFF0040", &mut buf);
        assert!(flags.contains(FrameFlags::DROP | FrameFlags::CHECKSUM_MISMATCH));
        assert!(!flags.contains(FrameFlags::TRUNCATED));
    }

    #[test]
    fn test_truncated_on_odd_boundary() {
        let mut buf = [0u8; 16];
        let (_, _, _, flags) = decode(b"010500ACFF004", &mut buf);
        assert!(flags
            .contains(FrameFlags::DROP | FrameFlags::TRUNCATED | FrameFlags::CHECKSUM_MISMATCH));
    }

    #[test]
    fn test_truncated_short_frame() {
        let mut buf = [0u8; 16];
        let (_, _, _, flags) = decode(b"0105", &mut buf);
        assert!(flags
            .contains(FrameFlags::DROP | FrameFlags::TRUNCATED | FrameFlags::CHECKSUM_MISMATCH));
    }

    #[test]
    fn test_redundant_byte_after_end() {
        let mut buf = [0u8; 16];
        let mut decoder = AsciiFrameDecoder::new(&mut buf);
        for &ch in b"010500ACFF004F".iter() {
            decoder.update(ch);
        }
        decoder.end().unwrap();
        decoder.update(b'0');
        let (_, flags) = decoder.into_frame().unwrap();
        assert!(flags.contains(FrameFlags::DROP | FrameFlags::REDUNDANT_BYTE));
    }

    #[test]
    fn test_reset_discards_partial_frame() {
        let mut buf = [0u8; 16];
        let mut decoder = AsciiFrameDecoder::new(&mut buf);
        for &ch in b"0106ZZ".iter() {
            decoder.update(ch);
        }
        decoder.reset();
        for &ch in b"010500ACFF004F".iter() {
            decoder.update(ch);
        }
        decoder.end().unwrap();
        let (frame, flags) = decoder.into_frame().unwrap();
        assert_eq!(frame.address, 0x01);
        assert_eq!(frame.function_code, 0x05);
        assert!(flags.is_empty());
    }

    #[test]
    fn test_buffer_overflow() {
        let payload: Vec<u8> = (0..8).collect();
        let wire = encode(Frame::new(0x01, 0x10, &payload), LF);
        let stripped = &wire[1..wire.len() - 2];

        let mut buf = [0u8; 4];
        let mut decoder = AsciiFrameDecoder::new(&mut buf);
        for &ch in stripped {
            decoder.update(ch);
        }
        decoder.end().unwrap();
        let (frame, flags) = decoder.into_frame().unwrap();

        assert!(flags.contains(FrameFlags::DROP | FrameFlags::BUFFER_OVERFLOW));
        assert!(!flags.contains(FrameFlags::CHECKSUM_MISMATCH));
        assert_eq!(frame.data, &payload[..4]);
    }
}
