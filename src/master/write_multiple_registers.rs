use crate::errors::MasterError;
use crate::frame::{function_codes, limits, BufferEmitter, BufferFetcher, Frame};

use super::cmdlet::{callback, classify_response, Cmdlet, MultipleWrittenSink};

/// Write Multiple Registers (0x10).
pub struct WriteMultipleRegisters;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteMultipleRegistersRequest {
    pub start_address: u16,
    pub values: Vec<u16>,
}

impl Cmdlet for WriteMultipleRegisters {
    type Request = WriteMultipleRegistersRequest;
    type Sink = dyn MultipleWrittenSink;

    fn build_request<'b>(
        &self,
        slave: u8,
        request: &WriteMultipleRegistersRequest,
        buffer: &'b mut [u8],
    ) -> Result<Frame<'b>, MasterError> {
        let quantity = request.values.len();
        if quantity == 0 || quantity > limits::MAX_WRITE_REGISTERS as usize {
            return Err(MasterError::BadRequest("register quantity out of range"));
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
            .write_u8((2 * quantity) as u8)
            .map_err(|_| MasterError::BufferLow)?;
        for &value in &request.values {
            emitter
                .write_u16_be(value)
                .map_err(|_| MasterError::BufferLow)?;
        }
        let len = emitter.written_len();

        Ok(Frame::new(
            slave,
            function_codes::WRITE_MULTIPLE_REGISTERS,
            &buffer[..len],
        ))
    }

    fn handle_response(
        &self,
        slave: u8,
        request: &WriteMultipleRegistersRequest,
        sink: &mut (dyn MultipleWrittenSink + 'static),
        frame: &Frame<'_>,
    ) -> Result<(), MasterError> {
        if let Some(code) =
            classify_response(slave, function_codes::WRITE_MULTIPLE_REGISTERS, frame)?
        {
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
