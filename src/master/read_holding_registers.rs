use crate::errors::MasterError;
use crate::frame::{function_codes, limits, Frame};

use super::cmdlet::{
    build_range_request, callback, classify_response, parse_register_response, Cmdlet,
    RegisterValueSink,
};

/// Read Holding Registers (0x03).
pub struct ReadHoldingRegisters;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadHoldingRegistersRequest {
    pub start_address: u16,
    pub quantity: u16,
}

impl Cmdlet for ReadHoldingRegisters {
    type Request = ReadHoldingRegistersRequest;
    type Sink = dyn RegisterValueSink;

    fn build_request<'b>(
        &self,
        slave: u8,
        request: &ReadHoldingRegistersRequest,
        buffer: &'b mut [u8],
    ) -> Result<Frame<'b>, MasterError> {
        build_range_request(
            slave,
            function_codes::READ_HOLDING_REGISTERS,
            request.start_address,
            request.quantity,
            limits::MAX_READ_REGISTERS,
            buffer,
        )
    }

    fn handle_response(
        &self,
        slave: u8,
        request: &ReadHoldingRegistersRequest,
        sink: &mut (dyn RegisterValueSink + 'static),
        frame: &Frame<'_>,
    ) -> Result<(), MasterError> {
        if let Some(code) = classify_response(slave, function_codes::READ_HOLDING_REGISTERS, frame)?
        {
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
        let request = ReadHoldingRegistersRequest {
            start_address: 0x006B,
            quantity: 3,
        };
        let frame = ReadHoldingRegisters
            .build_request(0x01, &request, &mut buf)
            .unwrap();
        assert_eq!(frame.address, 0x01);
        assert_eq!(frame.function_code, 0x03);
        assert_eq!(frame.data, [0x00, 0x6B, 0x00, 0x03]);
    }

    #[test]
    fn test_quantity_bounds() {
        let mut buf = [0xEE; 8];
        for quantity in [0u16, 126] {
            let request = ReadHoldingRegistersRequest {
                start_address: 0,
                quantity,
            };
            assert!(matches!(
                ReadHoldingRegisters.build_request(0x01, &request, &mut buf),
                Err(MasterError::BadRequest(_))
            ));
            assert_eq!(buf, [0xEE; 8]);
        }
    }

    #[test]
    fn test_parse_response_in_order() {
        let request = ReadHoldingRegistersRequest {
            start_address: 0x006B,
            quantity: 3,
        };
        let response = Frame::new(
            0x01,
            0x03,
            &[0x06, 0x02, 0x2B, 0x00, 0x00, 0x00, 0x64],
        );
        let mut sink = RecordingSink::default();

        ReadHoldingRegisters
            .handle_response(0x01, &request, &mut sink, &response)
            .unwrap();

        assert_eq!(
            sink.events,
            [
                SinkEvent::Start,
                SinkEvent::Register(0x006B, 0x022B),
                SinkEvent::Register(0x006C, 0x0000),
                SinkEvent::Register(0x006D, 0x0064),
                SinkEvent::End,
            ]
        );
    }

    #[test]
    fn test_parse_exception() {
        let request = ReadHoldingRegistersRequest {
            start_address: 0xFFFF,
            quantity: 2,
        };
        let response = Frame::new(0x01, 0x83, &[0x02]);
        let mut sink = RecordingSink::default();

        ReadHoldingRegisters
            .handle_response(0x01, &request, &mut sink, &response)
            .unwrap();
        assert_eq!(sink.events, [SinkEvent::Exception(0x02)]);
    }

    #[test]
    fn test_truncated_register_list() {
        let request = ReadHoldingRegistersRequest {
            start_address: 0,
            quantity: 2,
        };
        let response = Frame::new(0x01, 0x03, &[0x04, 0x00, 0x01, 0x00]);
        let mut sink = RecordingSink::default();
        assert!(matches!(
            ReadHoldingRegisters.handle_response(0x01, &request, &mut sink, &response),
            Err(MasterError::ResponseTruncated)
        ));
    }
}
