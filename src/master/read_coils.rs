use crate::errors::MasterError;
use crate::frame::{function_codes, limits, Frame};

use super::cmdlet::{
    build_range_request, callback, classify_response, parse_bit_response, BitValueSink, Cmdlet,
};

/// Read Coils (0x01).
pub struct ReadCoils;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadCoilsRequest {
    pub start_address: u16,
    pub quantity: u16,
}

impl Cmdlet for ReadCoils {
    type Request = ReadCoilsRequest;
    type Sink = dyn BitValueSink;

    fn build_request<'b>(
        &self,
        slave: u8,
        request: &ReadCoilsRequest,
        buffer: &'b mut [u8],
    ) -> Result<Frame<'b>, MasterError> {
        build_range_request(
            slave,
            function_codes::READ_COILS,
            request.start_address,
            request.quantity,
            limits::MAX_READ_BITS,
            buffer,
        )
    }

    fn handle_response(
        &self,
        slave: u8,
        request: &ReadCoilsRequest,
        sink: &mut (dyn BitValueSink + 'static),
        frame: &Frame<'_>,
    ) -> Result<(), MasterError> {
        if let Some(code) = classify_response(slave, function_codes::READ_COILS, frame)? {
            return sink.on_exception(code).map_err(callback);
        }
        parse_bit_response(request.start_address, request.quantity, frame, sink)
    }
}
