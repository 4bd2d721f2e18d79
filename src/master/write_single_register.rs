use crate::errors::MasterError;
use crate::frame::{function_codes, BufferEmitter, BufferFetcher, Frame};

use super::cmdlet::{callback, classify_response, Cmdlet, RegisterWrittenSink};

/// Write Single Register (0x06).
pub struct WriteSingleRegister;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSingleRegisterRequest {
    pub address: u16,
    pub value: u16,
}

impl Cmdlet for WriteSingleRegister {
    type Request = WriteSingleRegisterRequest;
    type Sink = dyn RegisterWrittenSink;

    fn build_request<'b>(
        &self,
        slave: u8,
        request: &WriteSingleRegisterRequest,
        buffer: &'b mut [u8],
    ) -> Result<Frame<'b>, MasterError> {
        let mut emitter = BufferEmitter::new(&mut *buffer);
        emitter
            .write_u16_be(request.address)
            .map_err(|_| MasterError::BufferLow)?;
        emitter
            .write_u16_be(request.value)
            .map_err(|_| MasterError::BufferLow)?;
        let len = emitter.written_len();

        Ok(Frame::new(
            slave,
            function_codes::WRITE_SINGLE_REGISTER,
            &buffer[..len],
        ))
    }

    fn handle_response(
        &self,
        slave: u8,
        request: &WriteSingleRegisterRequest,
        sink: &mut (dyn RegisterWrittenSink + 'static),
        frame: &Frame<'_>,
    ) -> Result<(), MasterError> {
        if let Some(code) = classify_response(slave, function_codes::WRITE_SINGLE_REGISTER, frame)?
        {
            return sink.on_exception(code).map_err(callback);
        }

        let mut fetcher = BufferFetcher::new(frame.data);
        let address = fetcher.read_u16_be()?;
        let value = fetcher.read_u16_be()?;

        if address != request.address || value != request.value {
            return Err(MasterError::InvalidFormat("echo mismatch"));
        }

        sink.on_written(address, value).map_err(callback)
    }
}
