mod mask_write_register;
mod read_coils;
mod read_discrete_inputs;
mod read_holding_registers;
mod read_input_registers;
mod read_write_multiple_registers;
mod write_multiple_coils;
mod write_multiple_registers;
mod write_single_coil;
mod write_single_register;

pub use mask_write_register::MaskWriteRegisterHandler;
pub use read_coils::ReadCoilsHandler;
pub use read_discrete_inputs::ReadDiscreteInputsHandler;
pub use read_holding_registers::ReadHoldingRegistersHandler;
pub use read_input_registers::ReadInputRegistersHandler;
pub use read_write_multiple_registers::ReadWriteMultipleRegistersHandler;
pub use write_multiple_coils::WriteMultipleCoilsHandler;
pub use write_multiple_registers::WriteMultipleRegistersHandler;
pub use write_single_coil::WriteSingleCoilHandler;
pub use write_single_register::WriteSingleRegisterHandler;

use crate::errors::SlaveError;
use crate::frame::{exception_codes, limits, BufferEmitter, BufferFetcher};

use super::handler::{exception_reply, Reply};
use super::model::DataModel;

/// End address of a `start + quantity` range, or `None` past 0xFFFF.
fn range_end(start: u16, quantity: u16) -> Option<u16> {
    start.checked_add(quantity - 1)
}

/// Shared body of Read Coils / Read Discrete Inputs: validate the range,
/// then pack the bits LSB-first by address with a zero-padded final byte.
fn handle_read_bits(
    model: &mut dyn DataModel,
    function_code: u8,
    request: &[u8],
    response: &mut [u8],
    valid: fn(&dyn DataModel, u16) -> bool,
    read: fn(&mut dyn DataModel, u16) -> Result<bool, SlaveError>,
) -> Result<Reply, SlaveError> {
    let mut fetcher = BufferFetcher::new(request);
    let start = fetcher.read_u16_be()?;
    let quantity = fetcher.read_u16_be()?;

    if quantity == 0 || quantity > limits::MAX_READ_BITS {
        return exception_reply(function_code, exception_codes::ILLEGAL_DATA_VALUE, response);
    }
    if !valid(model, start) {
        return exception_reply(function_code, exception_codes::ILLEGAL_DATA_ADDRESS, response);
    }
    if !matches!(range_end(start, quantity), Some(end) if valid(model, end)) {
        return exception_reply(function_code, exception_codes::ILLEGAL_DATA_ADDRESS, response);
    }

    let mut emitter = BufferEmitter::new(response);
    emitter
        .write_u8(limits::bit_byte_count(quantity) as u8)
        .map_err(|_| SlaveError::ResponseTruncated)?;

    let mut address = start;
    let mut remaining = quantity;
    while remaining > 0 {
        let bits = remaining.min(8);
        let mut packed = 0u8;
        for bit in 0..bits {
            if read(model, address)? {
                packed |= 1 << bit;
            }
            address = address.wrapping_add(1);
        }
        emitter
            .write_u8(packed)
            .map_err(|_| SlaveError::ResponseTruncated)?;
        remaining -= bits;
    }

    Ok(Reply {
        function_code,
        data_len: emitter.written_len(),
    })
}

/// Shared body of Read Holding/Input Registers.
fn handle_read_registers(
    model: &mut dyn DataModel,
    function_code: u8,
    request: &[u8],
    response: &mut [u8],
    valid: fn(&dyn DataModel, u16) -> bool,
    read: fn(&mut dyn DataModel, u16) -> Result<u16, SlaveError>,
) -> Result<Reply, SlaveError> {
    let mut fetcher = BufferFetcher::new(request);
    let start = fetcher.read_u16_be()?;
    let quantity = fetcher.read_u16_be()?;

    if quantity == 0 || quantity > limits::MAX_READ_REGISTERS {
        return exception_reply(function_code, exception_codes::ILLEGAL_DATA_VALUE, response);
    }
    if !valid(model, start) {
        return exception_reply(function_code, exception_codes::ILLEGAL_DATA_ADDRESS, response);
    }
    if !matches!(range_end(start, quantity), Some(end) if valid(model, end)) {
        return exception_reply(function_code, exception_codes::ILLEGAL_DATA_ADDRESS, response);
    }

    let mut emitter = BufferEmitter::new(response);
    emitter
        .write_u8((2 * quantity) as u8)
        .map_err(|_| SlaveError::ResponseTruncated)?;

    let mut address = start;
    for _ in 0..quantity {
        let value = read(model, address)?;
        emitter
            .write_u16_be(value)
            .map_err(|_| SlaveError::ResponseTruncated)?;
        address = address.wrapping_add(1);
    }

    Ok(Reply {
        function_code,
        data_len: emitter.written_len(),
    })
}
