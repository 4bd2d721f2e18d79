use crate::errors::SlaveError;
use crate::frame::{exception_codes, limits, BufferEmitter, BufferFetcher};
use crate::slave::handler::{exception_reply, CommandHandler, Reply};
use crate::slave::model::DataModel;

/// Write Multiple Coils (0x0F).
pub struct WriteMultipleCoilsHandler;

impl CommandHandler for WriteMultipleCoilsHandler {
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

        if quantity == 0 || quantity > limits::MAX_WRITE_BITS {
            return exception_reply(function_code, exception_codes::ILLEGAL_DATA_VALUE, response);
        }
        if !model.valid_coil(start) {
            return exception_reply(
                function_code,
                exception_codes::ILLEGAL_DATA_ADDRESS,
                response,
            );
        }
        match start.checked_add(quantity - 1) {
            Some(end) if model.valid_coil(end) => {}
            _ => {
                return exception_reply(
                    function_code,
                    exception_codes::ILLEGAL_DATA_ADDRESS,
                    response,
                )
            }
        }
        if byte_count as usize != limits::bit_byte_count(quantity) {
            return exception_reply(function_code, exception_codes::ILLEGAL_DATA_VALUE, response);
        }

        let mut address = start;
        let mut remaining = quantity;
        while remaining > 0 {
            let packed = fetcher.read_u8()?;
            let bits = remaining.min(8);
            for bit in 0..bits {
                model.write_coil(address, packed & (1 << bit) != 0)?;
                address = address.wrapping_add(1);
            }
            remaining -= bits;
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
    fn test_write_unpacks_bits() {
        let mut model = model();
        let mut response = [0u8; 8];

        // Ten coils from 0x0000: 0xCD 0x01.
        let reply = WriteMultipleCoilsHandler
            .handle(
                &mut model,
                0x0F,
                &[0x00, 0x00, 0x00, 0x0A, 0x02, 0xCD, 0x01],
                &mut response,
            )
            .unwrap();
        assert_eq!(reply.function_code, 0x0F);
        assert_eq!(&response[..reply.data_len], [0x00, 0x00, 0x00, 0x0A]);

        let expected = [
            true, false, true, true, false, false, true, true, true, false,
        ];
        for (address, &value) in expected.iter().enumerate() {
            assert_eq!(model.read_coil(address as u16).unwrap(), value);
        }
    }

    #[test]
    fn test_byte_count_mismatch() {
        let mut model = model();
        let mut response = [0u8; 8];

        let reply = WriteMultipleCoilsHandler
            .handle(
                &mut model,
                0x0F,
                &[0x00, 0x00, 0x00, 0x0A, 0x01, 0xCD],
                &mut response,
            )
            .unwrap();
        assert_eq!(reply.function_code, 0x8F);
        assert_eq!(&response[..reply.data_len], [0x03]);
    }

    #[test]
    fn test_unmapped_range() {
        let mut model = model();
        let mut response = [0u8; 8];

        let reply = WriteMultipleCoilsHandler
            .handle(
                &mut model,
                0x0F,
                &[0x00, 0x0E, 0x00, 0x04, 0x01, 0x0F],
                &mut response,
            )
            .unwrap();
        assert_eq!(reply.function_code, 0x8F);
        assert_eq!(&response[..reply.data_len], [0x02]);
    }

    #[test]
    fn test_payload_shorter_than_byte_count() {
        let mut model = model();
        let mut response = [0u8; 8];

        assert!(matches!(
            WriteMultipleCoilsHandler.handle(
                &mut model,
                0x0F,
                &[0x00, 0x00, 0x00, 0x0A, 0x02, 0xCD],
                &mut response,
            ),
            Err(SlaveError::RequestTruncated)
        ));
    }
}
