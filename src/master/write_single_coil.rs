use crate::errors::MasterError;
use crate::frame::{function_codes, limits, BufferEmitter, BufferFetcher, Frame};

use super::cmdlet::{callback, classify_response, BitWrittenSink, Cmdlet};

/// Write Single Coil (0x05).
pub struct WriteSingleCoil;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSingleCoilRequest {
    pub address: u16,
    pub value: bool,
}

impl Cmdlet for WriteSingleCoil {
    type Request = WriteSingleCoilRequest;
    type Sink = dyn BitWrittenSink;

    fn build_request<'b>(
        &self,
        slave: u8,
        request: &WriteSingleCoilRequest,
        buffer: &'b mut [u8],
    ) -> Result<Frame<'b>, MasterError> {
        let mut emitter = BufferEmitter::new(&mut *buffer);
        emitter
            .write_u16_be(request.address)
            .map_err(|_| MasterError::BufferLow)?;
        let encoded = if request.value {
            limits::COIL_ON
        } else {
            limits::COIL_OFF
        };
        emitter
            .write_u16_be(encoded)
            .map_err(|_| MasterError::BufferLow)?;
        let len = emitter.written_len();

        Ok(Frame::new(
            slave,
            function_codes::WRITE_SINGLE_COIL,
            &buffer[..len],
        ))
    }

    fn handle_response(
        &self,
        slave: u8,
        request: &WriteSingleCoilRequest,
        sink: &mut (dyn BitWrittenSink + 'static),
        frame: &Frame<'_>,
    ) -> Result<(), MasterError> {
        if let Some(code) = classify_response(slave, function_codes::WRITE_SINGLE_COIL, frame)? {
            return sink.on_exception(code).map_err(callback);
        }

        let mut fetcher = BufferFetcher::new(frame.data);
        let address = fetcher.read_u16_be()?;
        let encoded = fetcher.read_u16_be()?;

        let value = match encoded {
            limits::COIL_ON => true,
            limits::COIL_OFF => false,
            _ => return Err(MasterError::InvalidFormat("bad coil value encoding")),
        };

        // The reply must echo the request byte for byte.
        if address != request.address || value != request.value {
            return Err(MasterError::InvalidFormat("echo mismatch"));
        }

        sink.on_written(address, value).map_err(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::cmdlet::testing::{RecordingSink, SinkEvent};

    #[test]
    fn test_build_request() {
        let mut buf = [0u8; 8];
        let request = WriteSingleCoilRequest {
            address: 0x00AC,
            value: true,
        };
        let frame = WriteSingleCoil
            .build_request(0x01, &request, &mut buf)
            .unwrap();
        assert_eq!(frame.function_code, 0x05);
        assert_eq!(frame.data, [0x00, 0xAC, 0xFF, 0x00]);

        let request = WriteSingleCoilRequest {
            address: 0x00AC,
            value: false,
        };
        let frame = WriteSingleCoil
            .build_request(0x01, &request, &mut buf)
            .unwrap();
        assert_eq!(frame.data, [0x00, 0xAC, 0x00, 0x00]);
    }

    #[test]
    fn test_echo_accepted() {
        let request = WriteSingleCoilRequest {
            address: 0x00AC,
            value: true,
        };
        let response = Frame::new(0x01, 0x05, &[0x00, 0xAC, 0xFF, 0x00]);
        let mut sink = RecordingSink::default();

        WriteSingleCoil
            .handle_response(0x01, &request, &mut sink, &response)
            .unwrap();
        assert_eq!(sink.events, [SinkEvent::WrittenBit(0x00AC, true)]);
    }

    #[test]
    fn test_echo_mismatch_rejected() {
        let request = WriteSingleCoilRequest {
            address: 0x00AC,
            value: true,
        };
        let mut sink = RecordingSink::default();

        // Wrong address.
        let response = Frame::new(0x01, 0x05, &[0x00, 0xAD, 0xFF, 0x00]);
        assert!(matches!(
            WriteSingleCoil.handle_response(0x01, &request, &mut sink, &response),
            Err(MasterError::InvalidFormat(_))
        ));

        // Wrong value.
        let response = Frame::new(0x01, 0x05, &[0x00, 0xAC, 0x00, 0x00]);
        assert!(matches!(
            WriteSingleCoil.handle_response(0x01, &request, &mut sink, &response),
            Err(MasterError::InvalidFormat(_))
        ));

        // Malformed value encoding.
        let response = Frame::new(0x01, 0x05, &[0x00, 0xAC, 0xFF, 0x01]);
        assert!(matches!(
            WriteSingleCoil.handle_response(0x01, &request, &mut sink, &response),
            Err(MasterError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_truncated_echo() {
        let request = WriteSingleCoilRequest {
            address: 0x00AC,
            value: true,
        };
        let response = Frame::new(0x01, 0x05, &[0x00, 0xAC, 0xFF]);
        let mut sink = RecordingSink::default();
        assert!(matches!(
            WriteSingleCoil.handle_response(0x01, &request, &mut sink, &response),
            Err(MasterError::ResponseTruncated)
        ));
    }
}
