use crate::errors::MasterError;
use crate::frame::{function_codes, limits, BufferEmitter, BufferFetcher, Frame};

use super::cmdlet::{callback, classify_response, Cmdlet, MultipleWrittenSink};

/// Write Multiple Coils (0x0F).
pub struct WriteMultipleCoils;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteMultipleCoilsRequest {
    pub start_address: u16,
    pub values: Vec<bool>,
}

impl Cmdlet for WriteMultipleCoils {
    type Request = WriteMultipleCoilsRequest;
    type Sink = dyn MultipleWrittenSink;

    fn build_request<'b>(
        &self,
        slave: u8,
        request: &WriteMultipleCoilsRequest,
        buffer: &'b mut [u8],
    ) -> Result<Frame<'b>, MasterError> {
        let quantity = request.values.len();
        if quantity == 0 || quantity > limits::MAX_WRITE_BITS as usize {
            return Err(MasterError::BadRequest("coil quantity out of range"));
        }
        let quantity = quantity as u16;

        let mut emitter = BufferEmitter::new(&mut *buffer);
        emitter
            .write_u16_be(request.start_address)
            .map_err(|_| MasterError::BufferLow)?;
        emitter
            .write_u16_be(quantity)
            .map_err(|_| MasterError::BufferLow)?;
        emitter
            .write_u8(limits::bit_byte_count(quantity) as u8)
            .map_err(|_| MasterError::BufferLow)?;

        // Coils pack LSB-first by address; the trailing byte is zero-padded
        // in its unused high bits.
        for chunk in request.values.chunks(8) {
            let mut packed = 0u8;
            for (bit, &value) in chunk.iter().enumerate() {
                if value {
                    packed |= 1 << bit;
                }
            }
            emitter.write_u8(packed).map_err(|_| MasterError::BufferLow)?;
        }
        let len = emitter.written_len();

        Ok(Frame::new(
            slave,
            function_codes::WRITE_MULTIPLE_COILS,
            &buffer[..len],
        ))
    }

    fn handle_response(
        &self,
        slave: u8,
        request: &WriteMultipleCoilsRequest,
        sink: &mut (dyn MultipleWrittenSink + 'static),
        frame: &Frame<'_>,
    ) -> Result<(), MasterError> {
        if let Some(code) = classify_response(slave, function_codes::WRITE_MULTIPLE_COILS, frame)? {
            return sink.on_exception(code).map_err(callback);
        }

        let mut fetcher = BufferFetcher::new(frame.data);
        let start_address = fetcher.read_u16_be()?;
        let quantity = fetcher.read_u16_be()?;

        if start_address != request.start_address || quantity as usize != request.values.len() {
            return Err(MasterError::InvalidFormat("echo mismatch"));
        }

        sink.on_written(start_address, quantity).map_err(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::cmdlet::testing::{RecordingSink, SinkEvent};

    #[test]
    fn test_build_request_packs_bits() {
        let mut buf = [0u8; 16];
        let request = WriteMultipleCoilsRequest {
            start_address: 0x0013,
            values: vec![
                true, false, true, true, false, false, true, true, // 0xCD
                true, false, // 0x01
            ],
        };
        let frame = WriteMultipleCoils
            .build_request(0x11, &request, &mut buf)
            .unwrap();
        assert_eq!(frame.function_code, 0x0F);
        assert_eq!(frame.data, [0x00, 0x13, 0x00, 0x0A, 0x02, 0xCD, 0x01]);
    }

    #[test]
    fn test_exact_byte_boundaries() {
        let mut buf = [0u8; 16];
        // Eight coils fit exactly one byte; nine need two.
        let request = WriteMultipleCoilsRequest {
            start_address: 0,
            values: vec![true; 8],
        };
        let frame = WriteMultipleCoils
            .build_request(0x11, &request, &mut buf)
            .unwrap();
        assert_eq!(frame.data, [0x00, 0x00, 0x00, 0x08, 0x01, 0xFF]);

        let request = WriteMultipleCoilsRequest {
            start_address: 0,
            values: vec![
                false, false, false, false, false, false, false, false, true,
            ],
        };
        let frame = WriteMultipleCoils
            .build_request(0x11, &request, &mut buf)
            .unwrap();
        assert_eq!(frame.data, [0x00, 0x00, 0x00, 0x09, 0x02, 0x00, 0x01]);
    }

    #[test]
    fn test_quantity_bounds() {
        let mut buf = [0xEE; 8];
        for quantity in [0usize, 1969] {
            let request = WriteMultipleCoilsRequest {
                start_address: 0,
                values: vec![false; quantity],
            };
            assert!(matches!(
                WriteMultipleCoils.build_request(0x11, &request, &mut buf),
                Err(MasterError::BadRequest(_))
            ));
            assert_eq!(buf, [0xEE; 8]);
        }
    }

    #[test]
    fn test_echo_validation() {
        let request = WriteMultipleCoilsRequest {
            start_address: 0x0013,
            values: vec![true; 10],
        };
        let mut sink = RecordingSink::default();

        let response = Frame::new(0x11, 0x0F, &[0x00, 0x13, 0x00, 0x0A]);
        WriteMultipleCoils
            .handle_response(0x11, &request, &mut sink, &response)
            .unwrap();
        assert_eq!(sink.events, [SinkEvent::WrittenMultiple(0x0013, 10)]);

        let response = Frame::new(0x11, 0x0F, &[0x00, 0x13, 0x00, 0x0B]);
        assert!(matches!(
            WriteMultipleCoils.handle_response(0x11, &request, &mut sink, &response),
            Err(MasterError::InvalidFormat(_))
        ));
    }
}
