use crate::errors::SlaveError;
use crate::frame::{exception_codes, limits, BufferEmitter, BufferFetcher};
use crate::slave::handler::{exception_reply, CommandHandler, Reply};
use crate::slave::model::DataModel;

/// Write Multiple Registers (0x10).
pub struct WriteMultipleRegistersHandler;

impl CommandHandler for WriteMultipleRegistersHandler {
    fn handle(
        &self,
        model: &mut dyn DataModel,
        function_code: u8,
        request: &[u8],
        response: &mut [u8],
    ) -> Result<Reply, SlaveError> {
        let mut fetcher = BufferFetcher::new(request);
        let start = fetcher.read_u16_be()?;
        let quantity = fetcher.read_u16_be()?;
        let byte_count = fetcher.read_u8()?;

        if quantity == 0 || quantity > limits::MAX_WRITE_REGISTERS {
            return exception_reply(function_code, exception_codes::ILLEGAL_DATA_VALUE, response);
        }
        if !model.valid_holding_register(start) {
            return exception_reply(
                function_code,
                exception_codes::ILLEGAL_DATA_ADDRESS,
                response,
            );
        }
        match start.checked_add(quantity - 1) {
            Some(end) if model.valid_holding_register(end) => {}
            _ => {
                return exception_reply(
                    function_code,
                    exception_codes::ILLEGAL_DATA_ADDRESS,
                    response,
                )
            }
        }
        if byte_count as usize != 2 * quantity as usize {
            return exception_reply(function_code, exception_codes::ILLEGAL_DATA_VALUE, response);
        }

        let mut address = start;
        for _ in 0..quantity {
            let value = fetcher.read_u16_be()?;
            model.write_holding_register(address, value)?;
            address = address.wrapping_add(1);
        }

        let mut emitter = BufferEmitter::new(response);
        emitter
            .write_u16_be(start)
            .map_err(|_| SlaveError::ResponseTruncated)?;
        emitter
            .write_u16_be(quantity)
            .map_err(|_| SlaveError::ResponseTruncated)?;

        Ok(Reply {
            function_code,
            data_len: emitter.written_len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slave::handlers::testing::model;

    #[test]
    fn test_write_registers() {
        let mut model = model();
        let mut response = [0u8; 8];

        let reply = WriteMultipleRegistersHandler
            .handle(
                &mut model,
                0x10,
                &[0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02],
                &mut response,
            )
            .unwrap();
        assert_eq!(reply.function_code, 0x10);
        assert_eq!(&response[..reply.data_len], [0x00, 0x01, 0x00, 0x02]);
        assert_eq!(model.read_holding_register(1).unwrap(), 0x000A);
        assert_eq!(model.read_holding_register(2).unwrap(), 0x0102);
    }

    #[test]
    fn test_byte_count_mismatch() {
        let mut model = model();
        let mut response = [0u8; 8];

        let reply = WriteMultipleRegistersHandler
            .handle(
                &mut model,
                0x10,
                &[0x00, 0x01, 0x00, 0x02, 0x03, 0x00, 0x0A, 0x01],
                &mut response,
            )
            .unwrap();
        assert_eq!(reply.function_code, 0x90);
        assert_eq!(&response[..reply.data_len], [0x03]);
    }

    #[test]
    fn test_bad_quantity() {
        let mut model = model();
        let mut response = [0u8; 8];

        let reply = WriteMultipleRegistersHandler
            .handle(
                &mut model,
                0x10,
                &[0x00, 0x01, 0x00, 0x7C, 0xF8],
                &mut response,
            )
            .unwrap();
        assert_eq!(reply.function_code, 0x90);
        assert_eq!(&response[..reply.data_len], [0x03]);
    }
}
