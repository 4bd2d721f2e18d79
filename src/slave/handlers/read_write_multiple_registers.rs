use crate::errors::SlaveError;
use crate::frame::{exception_codes, limits, BufferEmitter, BufferFetcher};
use crate::slave::handler::{exception_reply, CommandHandler, Reply};
use crate::slave::model::DataModel;

/// Read/Write Multiple Registers (0x17). The write executes first; the
/// reply carries only the read registers.
pub struct ReadWriteMultipleRegistersHandler;

impl CommandHandler for ReadWriteMultipleRegistersHandler {
    fn handle(
        &self,
        model: &mut dyn DataModel,
        function_code: u8,
        request: &[u8],
        response: &mut [u8],
    ) -> Result<Reply, SlaveError> {
        let mut fetcher = BufferFetcher::new(request);
        let read_start = fetcher.read_u16_be()?;
        let read_quantity = fetcher.read_u16_be()?;
        let write_start = fetcher.read_u16_be()?;
        let write_quantity = fetcher.read_u16_be()?;
        let byte_count = fetcher.read_u8()?;

        if read_quantity == 0
            || read_quantity > limits::MAX_RW_READ_REGISTERS
            || write_quantity == 0
            || write_quantity > limits::MAX_RW_WRITE_REGISTERS
        {
            return exception_reply(function_code, exception_codes::ILLEGAL_DATA_VALUE, response);
        }

        let read_range_valid = model.valid_holding_register(read_start)
            && matches!(
                read_start.checked_add(read_quantity - 1),
                Some(end) if model.valid_holding_register(end)
            );
        let write_range_valid = model.valid_holding_register(write_start)
            && matches!(
                write_start.checked_add(write_quantity - 1),
                Some(end) if model.valid_holding_register(end)
            );
        if !read_range_valid || !write_range_valid {
            return exception_reply(
                function_code,
                exception_codes::ILLEGAL_DATA_ADDRESS,
                response,
            );
        }

        if byte_count as usize != 2 * write_quantity as usize {
            return exception_reply(function_code, exception_codes::ILLEGAL_DATA_VALUE, response);
        }

        let mut address = write_start;
        for _ in 0..write_quantity {
            let value = fetcher.read_u16_be()?;
            model.write_holding_register(address, value)?;
            address = address.wrapping_add(1);
        }

        let mut emitter = BufferEmitter::new(response);
        emitter
            .write_u8((2 * read_quantity) as u8)
            .map_err(|_| SlaveError::ResponseTruncated)?;
        let mut address = read_start;
        for _ in 0..read_quantity {
            let value = model.read_holding_register(address)?;
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
}
