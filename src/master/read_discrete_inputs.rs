use crate::errors::MasterError;
use crate::frame::{function_codes, limits, Frame};

use super::cmdlet::{
    build_range_request, callback, classify_response, parse_bit_response, BitValueSink, Cmdlet,
};

/// Read Discrete Inputs (0x02).
pub struct ReadDiscreteInputs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadDiscreteInputsRequest {
    pub start_address: u16,
    pub quantity: u16,
}

impl Cmdlet for ReadDiscreteInputs {
    type Request = ReadDiscreteInputsRequest;
    type Sink = dyn BitValueSink;

    fn build_request<'b>(
        &self,
        slave: u8,
        request: &ReadDiscreteInputsRequest,
        buffer: &'b mut [u8],
    ) -> Result<Frame<'b>, MasterError> {
        build_range_request(
            slave,
            function_codes::READ_DISCRETE_INPUTS,
            request.start_address,
            request.quantity,
            limits::MAX_READ_BITS,
            buffer,
        )
    }

    fn handle_response(
        &self,
        slave: u8,
        request: &ReadDiscreteInputsRequest,
        sink: &mut (dyn BitValueSink + 'static),
        frame: &Frame<'_>,
    ) -> Result<(), MasterError> {
        if let Some(code) = classify_response(slave, function_codes::READ_DISCRETE_INPUTS, frame)? {
            return sink.on_exception(code).map_err(callback);
        }
        parse_bit_response(request.start_address, request.quantity, frame, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::cmdlet::testing::{RecordingSink, SinkEvent};

    #[test]
    fn test_build_request() {
        let mut buf = [0u8; 8];
        let request = ReadDiscreteInputsRequest {
            start_address: 0x00C4,
            quantity: 0x0016,
        };
        let frame = ReadDiscreteInputs
            .build_request(0x11, &request, &mut buf)
            .unwrap();
        assert_eq!(frame.function_code, 0x02);
        assert_eq!(frame.data, [0x00, 0xC4, 0x00, 0x16]);
    }

    #[test]
    fn test_quantity_bounds() {
        let mut buf = [0xEE; 8];
        let request = ReadDiscreteInputsRequest {
            start_address: 0,
            quantity: 2001,
        };
        assert!(matches!(
            ReadDiscreteInputs.build_request(0x11, &request, &mut buf),
            Err(MasterError::BadRequest(_))
        ));
        assert_eq!(buf, [0xEE; 8]);
    }

    #[test]
    fn test_parse_response() {
        let request = ReadDiscreteInputsRequest {
            start_address: 0x00C4,
            quantity: 3,
        };
        let response = Frame::new(0x11, 0x02, &[0x01, 0x05]);
        let mut sink = RecordingSink::default();

        ReadDiscreteInputs
            .handle_response(0x11, &request, &mut sink, &response)
            .unwrap();

        assert_eq!(
            sink.events,
            [
                SinkEvent::Start,
                SinkEvent::Bit(0x00C4, true),
                SinkEvent::Bit(0x00C5, false),
                SinkEvent::Bit(0x00C6, true),
                SinkEvent::End,
            ]
        );
    }
}
