use crate::errors::MasterError;
use crate::frame::{function_codes, limits, BufferEmitter, Frame};

use super::cmdlet::{
    callback, classify_response, parse_register_response, Cmdlet, RegisterValueSink,
};

/// Read/Write Multiple Registers (0x17).
///
/// The write is performed before the read; the reply carries the read
/// registers only.
pub struct ReadWriteMultipleRegisters;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadWriteMultipleRegistersRequest {
    pub read_start_address: u16,
    pub read_quantity: u16,
    pub write_start_address: u16,
    pub write_values: Vec<u16>,
}

impl Cmdlet for ReadWriteMultipleRegisters {
    type Request = ReadWriteMultipleRegistersRequest;
    type Sink = dyn RegisterValueSink;

    fn build_request<'b>(
        &self,
        slave: u8,
        request: &ReadWriteMultipleRegistersRequest,
        buffer: &'b mut [u8],
    ) -> Result<Frame<'b>, MasterError> {
        if request.read_quantity == 0 || request.read_quantity > limits::MAX_RW_READ_REGISTERS {
            return Err(MasterError::BadRequest("read quantity out of range"));
        }
        let write_quantity = request.write_values.len();
        if write_quantity == 0 || write_quantity > limits::MAX_RW_WRITE_REGISTERS as usize {
            return Err(MasterError::BadRequest("write quantity out of range"));
        }
        let write_quantity = write_quantity as u16;

        let mut emitter = BufferEmitter::new(&mut *buffer);
        emitter
            .write_u16_be(request.read_start_address)
            .map_err(|_| MasterError::BufferLow)?;
        emitter
            .write_u16_be(request.read_quantity)
            .map_err(|_| MasterError::BufferLow)?;
        emitter
            .write_u16_be(request.write_start_address)
            .map_err(|_| MasterError::BufferLow)?;
        emitter
            .write_u16_be(write_quantity)
            .map_err(|_| MasterError::BufferLow)?;
        emitter
            .write_u8((2 * write_quantity) as u8)
            .map_err(|_| MasterError::BufferLow)?;
        for &value in &request.write_values {
            emitter
                .write_u16_be(value)
                .map_err(|_| MasterError::BufferLow)?;
        }
        let len = emitter.written_len();

        Ok(Frame::new(
            slave,
            function_codes::READ_WRITE_MULTIPLE_REGISTERS,
            &buffer[..len],
        ))
    }

    fn handle_response(
        &self,
        slave: u8,
        request: &ReadWriteMultipleRegistersRequest,
        sink: &mut (dyn RegisterValueSink + 'static),
        frame: &Frame<'_>,
    ) -> Result<(), MasterError> {
        if let Some(code) =
            classify_response(slave, function_codes::READ_WRITE_MULTIPLE_REGISTERS, frame)?
        {
            return sink.on_exception(code).map_err(callback);
        }
        parse_register_response(
            request.read_start_address,
            request.read_quantity,
            frame,
            sink,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::cmdlet::testing::{RecordingSink, SinkEvent};

    #[test]
    fn test_build_request() {
        let mut buf = [0u8; 32];
        let request = ReadWriteMultipleRegistersRequest {
            read_start_address: 0x0003,
            read_quantity: 6,
            write_start_address: 0x000E,
            write_values: vec![0x00FF, 0x00FE, 0x00FD],
        };
        let frame = ReadWriteMultipleRegisters
            .build_request(0x11, &request, &mut buf)
            .unwrap();
        assert_eq!(frame.function_code, 0x17);
        assert_eq!(
            frame.data,
            [
                0x00, 0x03, 0x00, 0x06, 0x00, 0x0E, 0x00, 0x03, 0x06, 0x00, 0xFF, 0x00, 0xFE,
                0x00, 0xFD
            ]
        );
    }

    #[test]
    fn test_quantity_bounds() {
        let mut buf = [0xEE; 8];

        let request = ReadWriteMultipleRegistersRequest {
            read_start_address: 0,
            read_quantity: 126,
            write_start_address: 0,
            write_values: vec![0],
        };
        assert!(matches!(
            ReadWriteMultipleRegisters.build_request(0x11, &request, &mut buf),
            Err(MasterError::BadRequest(_))
        ));

        let request = ReadWriteMultipleRegistersRequest {
            read_start_address: 0,
            read_quantity: 1,
            write_start_address: 0,
            write_values: vec![0; 122],
        };
        assert!(matches!(
            ReadWriteMultipleRegisters.build_request(0x11, &request, &mut buf),
            Err(MasterError::BadRequest(_))
        ));
        assert_eq!(buf, [0xEE; 8]);
    }

    #[test]
    fn test_parse_read_half() {
        let request = ReadWriteMultipleRegistersRequest {
            read_start_address: 0x0003,
            read_quantity: 2,
            write_start_address: 0x000E,
            write_values: vec![0x00FF],
        };
        let response = Frame::new(0x11, 0x17, &[0x04, 0x00, 0xFE, 0x0A, 0xCD]);
        let mut sink = RecordingSink::default();

        ReadWriteMultipleRegisters
            .handle_response(0x11, &request, &mut sink, &response)
            .unwrap();
        assert_eq!(
            sink.events,
            [
                SinkEvent::Start,
                SinkEvent::Register(0x0003, 0x00FE),
                SinkEvent::Register(0x0004, 0x0ACD),
                SinkEvent::End,
            ]
        );
    }
}
