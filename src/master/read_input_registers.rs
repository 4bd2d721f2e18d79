use crate::errors::MasterError;
use crate::frame::{function_codes, limits, Frame};

use super::cmdlet::{
    build_range_request, callback, classify_response, parse_register_response, Cmdlet,
    RegisterValueSink,
};

/// Read Input Registers (0x04).
pub struct ReadInputRegisters;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadInputRegistersRequest {
    pub start_address: u16,
    pub quantity: u16,
}

impl Cmdlet for ReadInputRegisters {
    type Request = ReadInputRegistersRequest;
    type Sink = dyn RegisterValueSink;

    fn build_request<'b>(
        &self,
        slave: u8,
        request: &ReadInputRegistersRequest,
        buffer: &'b mut [u8],
    ) -> Result<Frame<'b>, MasterError> {
        build_range_request(
            slave,
            function_codes::READ_INPUT_REGISTERS,
            request.start_address,
            request.quantity,
            limits::MAX_READ_REGISTERS,
            buffer,
        )
    }

    fn handle_response(
        &self,
        slave: u8,
        request: &ReadInputRegistersRequest,
        sink: &mut (dyn RegisterValueSink + 'static),
        frame: &Frame<'_>,
    ) -> Result<(), MasterError> {
        if let Some(code) = classify_response(slave, function_codes::READ_INPUT_REGISTERS, frame)? {
            return sink.on_exception(code).map_err(callback);
        }
        parse_register_response(request.start_address, request.quantity, frame, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::cmdlet::testing::{RecordingSink, SinkEvent};

    #[test]
    fn test_build_request() {
        let mut buf = [0u8; 8];
        let request = ReadInputRegistersRequest {
            start_address: 0x0008,
            quantity: 1,
        };
        let frame = ReadInputRegisters
            .build_request(0x11, &request, &mut buf)
            .unwrap();
        assert_eq!(frame.function_code, 0x04);
        assert_eq!(frame.data, [0x00, 0x08, 0x00, 0x01]);
    }

    #[test]
    fn test_parse_response() {
        let request = ReadInputRegistersRequest {
            start_address: 0x0008,
            quantity: 1,
        };
        let response = Frame::new(0x11, 0x04, &[0x02, 0x00, 0x0A]);
        let mut sink = RecordingSink::default();

        ReadInputRegisters
            .handle_response(0x11, &request, &mut sink, &response)
            .unwrap();
        assert_eq!(
            sink.events,
            [
                SinkEvent::Start,
                SinkEvent::Register(0x0008, 0x000A),
                SinkEvent::End,
            ]
        );
    }

    #[test]
    fn test_quantity_bounds() {
        let mut buf = [0xEE; 8];
        let request = ReadInputRegistersRequest {
            start_address: 0,
            quantity: 0,
        };
        assert!(matches!(
            ReadInputRegisters.build_request(0x11, &request, &mut buf),
            Err(MasterError::BadRequest(_))
        ));
        assert_eq!(buf, [0xEE; 8]);
    }
}
