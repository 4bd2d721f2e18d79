use crate::errors::MasterError;
use crate::frame::{limits, BufferEmitter, BufferFetcher, Frame};

/// Error type reported by response sinks.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;
pub type SinkResult = Result<(), SinkError>;

/// Base of every response sink: exception responses are delivered here, not
/// as errors. Partial frames never reach a sink.
pub trait ResponseSink: Send {
    fn on_exception(&mut self, code: u8) -> SinkResult;
}

/// Streamed per-bit results of Read Coils / Read Discrete Inputs.
pub trait BitValueSink: ResponseSink {
    fn on_start(&mut self) -> SinkResult {
        Ok(())
    }
    fn on_value(&mut self, address: u16, value: bool) -> SinkResult;
    fn on_end(&mut self) -> SinkResult {
        Ok(())
    }
}

/// Streamed per-register results of the register read commands.
pub trait RegisterValueSink: ResponseSink {
    fn on_start(&mut self) -> SinkResult {
        Ok(())
    }
    fn on_value(&mut self, address: u16, value: u16) -> SinkResult;
    fn on_end(&mut self) -> SinkResult {
        Ok(())
    }
}

/// Confirmation of Write Single Coil.
pub trait BitWrittenSink: ResponseSink {
    fn on_written(&mut self, address: u16, value: bool) -> SinkResult;
}

/// Confirmation of Write Single Register.
pub trait RegisterWrittenSink: ResponseSink {
    fn on_written(&mut self, address: u16, value: u16) -> SinkResult;
}

/// Confirmation of Write Multiple Coils / Write Multiple Registers.
pub trait MultipleWrittenSink: ResponseSink {
    fn on_written(&mut self, start_address: u16, quantity: u16) -> SinkResult;
}

/// Confirmation of Mask Write Register.
pub trait MaskWrittenSink: ResponseSink {
    fn on_written(&mut self, address: u16, and_mask: u16, or_mask: u16) -> SinkResult;
}

/// One per-function-code command: a request builder and a response parser.
///
/// `build_request` serializes the typed request into the master's buffer
/// and returns the frame to transmit; it must not touch the buffer when the
/// request parameters are invalid. `handle_response` validates the reply
/// frame and streams results into the sink.
pub trait Cmdlet {
    type Request;
    type Sink: ?Sized;

    fn build_request<'b>(
        &self,
        slave: u8,
        request: &Self::Request,
        buffer: &'b mut [u8],
    ) -> Result<Frame<'b>, MasterError>;

    fn handle_response(
        &self,
        slave: u8,
        request: &Self::Request,
        sink: &mut Self::Sink,
        frame: &Frame<'_>,
    ) -> Result<(), MasterError>;
}

pub(crate) fn callback(err: SinkError) -> MasterError {
    MasterError::Callback(err)
}

/// Sort a reply frame into the three possible shapes: ours-and-normal,
/// ours-and-exception (with its code), or not addressed to us at all.
pub(crate) fn classify_response(
    slave: u8,
    function_code: u8,
    frame: &Frame<'_>,
) -> Result<Option<u8>, MasterError> {
    if frame.address != slave {
        return Err(MasterError::InvalidSlave);
    }
    if frame.function_code == function_code {
        Ok(None)
    } else if frame.function_code == function_code | 0x80 {
        let mut fetcher = BufferFetcher::new(frame.data);
        Ok(Some(fetcher.read_u8()?))
    } else {
        Err(MasterError::InvalidFunctionCode)
    }
}

/// Shared builder of the `start address + quantity` read requests
/// (0x01-0x04).
pub(crate) fn build_range_request<'b>(
    slave: u8,
    function_code: u8,
    start_address: u16,
    quantity: u16,
    max_quantity: u16,
    buffer: &'b mut [u8],
) -> Result<Frame<'b>, MasterError> {
    if quantity == 0 || quantity > max_quantity {
        return Err(MasterError::BadRequest("quantity out of range"));
    }

    let mut emitter = BufferEmitter::new(&mut *buffer);
    emitter
        .write_u16_be(start_address)
        .map_err(|_| MasterError::BufferLow)?;
    emitter
        .write_u16_be(quantity)
        .map_err(|_| MasterError::BufferLow)?;
    let len = emitter.written_len();

    Ok(Frame::new(slave, function_code, &buffer[..len]))
}

/// Shared parser of the packed-bit read responses (0x01, 0x02).
pub(crate) fn parse_bit_response(
    request_start: u16,
    request_quantity: u16,
    frame: &Frame<'_>,
    sink: &mut dyn BitValueSink,
) -> Result<(), MasterError> {
    let mut fetcher = BufferFetcher::new(frame.data);

    let byte_count = fetcher.read_u8()? as usize;
    if byte_count != limits::bit_byte_count(request_quantity) {
        return Err(MasterError::InvalidFormat("byte count mismatch"));
    }

    sink.on_start().map_err(callback)?;

    let mut address = request_start;
    let mut remaining = request_quantity;
    while remaining > 0 {
        let packed = fetcher.read_u8()?;
        let bits = remaining.min(8);
        for bit in 0..bits {
            sink.on_value(address, packed & (1 << bit) != 0)
                .map_err(callback)?;
            address = address.wrapping_add(1);
        }
        remaining -= bits;
    }

    sink.on_end().map_err(callback)?;
    Ok(())
}

/// Shared parser of the 16-bit register read responses (0x03, 0x04, and
/// the read half of 0x17).
pub(crate) fn parse_register_response(
    request_start: u16,
    request_quantity: u16,
    frame: &Frame<'_>,
    sink: &mut dyn RegisterValueSink,
) -> Result<(), MasterError> {
    let mut fetcher = BufferFetcher::new(frame.data);

    let byte_count = fetcher.read_u8()? as usize;
    if byte_count != 2 * request_quantity as usize {
        return Err(MasterError::InvalidFormat("byte count mismatch"));
    }

    sink.on_start().map_err(callback)?;

    let mut address = request_start;
    for _ in 0..request_quantity {
        let value = fetcher.read_u16_be()?;
        sink.on_value(address, value).map_err(callback)?;
        address = address.wrapping_add(1);
    }

    sink.on_end().map_err(callback)?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// What a recording sink observed, in order.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SinkEvent {
        Start,
        Bit(u16, bool),
        Register(u16, u16),
        End,
        Exception(u8),
        WrittenBit(u16, bool),
        WrittenRegister(u16, u16),
        WrittenMultiple(u16, u16),
        WrittenMask(u16, u16, u16),
    }

    /// Records every sink callback; all the cmdlet tests assert on it.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub events: Vec<SinkEvent>,
        pub fail_on_value: bool,
    }

    impl ResponseSink for RecordingSink {
        fn on_exception(&mut self, code: u8) -> SinkResult {
            self.events.push(SinkEvent::Exception(code));
            Ok(())
        }
    }

    impl BitValueSink for RecordingSink {
        fn on_start(&mut self) -> SinkResult {
            self.events.push(SinkEvent::Start);
            Ok(())
        }
        fn on_value(&mut self, address: u16, value: bool) -> SinkResult {
            if self.fail_on_value {
                return Err("sink failure".into());
            }
            self.events.push(SinkEvent::Bit(address, value));
            Ok(())
        }
        fn on_end(&mut self) -> SinkResult {
            self.events.push(SinkEvent::End);
            Ok(())
        }
    }

    impl RegisterValueSink for RecordingSink {
        fn on_start(&mut self) -> SinkResult {
            self.events.push(SinkEvent::Start);
            Ok(())
        }
        fn on_value(&mut self, address: u16, value: u16) -> SinkResult {
            if self.fail_on_value {
                return Err("sink failure".into());
            }
            self.events.push(SinkEvent::Register(address, value));
            Ok(())
        }
        fn on_end(&mut self) -> SinkResult {
            self.events.push(SinkEvent::End);
            Ok(())
        }
    }

    impl BitWrittenSink for RecordingSink {
        fn on_written(&mut self, address: u16, value: bool) -> SinkResult {
            self.events.push(SinkEvent::WrittenBit(address, value));
            Ok(())
        }
    }

    impl RegisterWrittenSink for RecordingSink {
        fn on_written(&mut self, address: u16, value: u16) -> SinkResult {
            self.events.push(SinkEvent::WrittenRegister(address, value));
            Ok(())
        }
    }

    impl MultipleWrittenSink for RecordingSink {
        fn on_written(&mut self, start_address: u16, quantity: u16) -> SinkResult {
            self.events
                .push(SinkEvent::WrittenMultiple(start_address, quantity));
            Ok(())
        }
    }

    impl MaskWrittenSink for RecordingSink {
        fn on_written(&mut self, address: u16, and_mask: u16, or_mask: u16) -> SinkResult {
            self.events
                .push(SinkEvent::WrittenMask(address, and_mask, or_mask));
            Ok(())
        }
    }
}
