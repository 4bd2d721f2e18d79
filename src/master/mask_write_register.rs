use crate::errors::MasterError;
use crate::frame::{function_codes, BufferEmitter, BufferFetcher, Frame};

use super::cmdlet::{callback, classify_response, Cmdlet, MaskWrittenSink};

/// Mask Write Register (0x16).
///
/// The slave computes `(current & and_mask) | (or_mask & !and_mask)`.
pub struct MaskWriteRegister;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskWriteRegisterRequest {
    pub address: u16,
    pub and_mask: u16,
    pub or_mask: u16,
}

impl Cmdlet for MaskWriteRegister {
    type Request = MaskWriteRegisterRequest;
    type Sink = dyn MaskWrittenSink;

    fn build_request<'b>(
        &self,
        slave: u8,
        request: &MaskWriteRegisterRequest,
        buffer: &'b mut [u8],
    ) -> Result<Frame<'b>, MasterError> {
        let mut emitter = BufferEmitter::new(&mut *buffer);
        emitter
            .write_u16_be(request.address)
            .map_err(|_| MasterError::BufferLow)?;
        emitter
            .write_u16_be(request.and_mask)
            .map_err(|_| MasterError::BufferLow)?;
        emitter
            .write_u16_be(request.or_mask)
            .map_err(|_| MasterError::BufferLow)?;
        let len = emitter.written_len();

        Ok(Frame::new(
            slave,
            function_codes::MASK_WRITE_REGISTER,
            &buffer[..len],
        ))
    }

    fn handle_response(
        &self,
        slave: u8,
        request: &MaskWriteRegisterRequest,
        sink: &mut (dyn MaskWrittenSink + 'static),
        frame: &Frame<'_>,
    ) -> Result<(), MasterError> {
        if let Some(code) = classify_response(slave, function_codes::MASK_WRITE_REGISTER, frame)? {
            return sink.on_exception(code).map_err(callback);
        }

        let mut fetcher = BufferFetcher::new(frame.data);
        let address = fetcher.read_u16_be()?;
        let and_mask = fetcher.read_u16_be()?;
        let or_mask = fetcher.read_u16_be()?;

        if address != request.address
            || and_mask != request.and_mask
            || or_mask != request.or_mask
        {
            return Err(MasterError::InvalidFormat("echo mismatch"));
        }

        sink.on_written(address, and_mask, or_mask).map_err(callback)
    }
}
