use crate::errors::SlaveError;
use crate::frame::{exception_codes, BufferEmitter, BufferFetcher};
use crate::slave::handler::{exception_reply, CommandHandler, Reply};
use crate::slave::model::DataModel;

/// Mask Write Register (0x16): `(current & and) | (or & !and)`.
pub struct MaskWriteRegisterHandler;

impl CommandHandler for MaskWriteRegisterHandler {
    fn handle(
        &self,
        model: &mut dyn DataModel,
        function_code: u8,
        request: &[u8],
        response: &mut [u8],
    ) -> Result<Reply, SlaveError> {
        let mut fetcher = BufferFetcher::new(request);
        let address = fetcher.read_u16_be()?;
        let and_mask = fetcher.read_u16_be()?;
        let or_mask = fetcher.read_u16_be()?;

        if !model.valid_holding_register(address) {
            return exception_reply(
                function_code,
                exception_codes::ILLEGAL_DATA_ADDRESS,
                response,
            );
        }

        let current = model.read_holding_register(address)?;
        let result = (current & and_mask) | (or_mask & !and_mask);
        model.write_holding_register(address, result)?;

        let mut emitter = BufferEmitter::new(response);
        emitter
            .write_u16_be(address)
            .map_err(|_| SlaveError::ResponseTruncated)?;
        emitter
            .write_u16_be(and_mask)
            .map_err(|_| SlaveError::ResponseTruncated)?;
        emitter
            .write_u16_be(or_mask)
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
    fn test_mask_write() {
        let mut model = model();
        model.write_holding_register(4, 0x0012).unwrap();
        let mut response = [0u8; 8];

        // The canonical example: current 0x12, AND 0xF2, OR 0x25 -> 0x17.
        let reply = MaskWriteRegisterHandler
            .handle(
                &mut model,
                0x16,
                &[0x00, 0x04, 0x00, 0xF2, 0x00, 0x25],
                &mut response,
            )
            .unwrap();
        assert_eq!(reply.function_code, 0x16);
        assert_eq!(
            &response[..reply.data_len],
            [0x00, 0x04, 0x00, 0xF2, 0x00, 0x25]
        );
        assert_eq!(model.read_holding_register(4).unwrap(), 0x0017);
    }

    #[test]
    fn test_unmapped_address() {
        let mut model = model();
        let mut response = [0u8; 8];

        let reply = MaskWriteRegisterHandler
            .handle(
                &mut model,
                0x16,
                &[0x01, 0x00, 0x00, 0xF2, 0x00, 0x25],
                &mut response,
            )
            .unwrap();
        assert_eq!(reply.function_code, 0x96);
        assert_eq!(&response[..reply.data_len], [0x02]);
    }

    #[test]
    fn test_truncated_request() {
        let mut model = model();
        let mut response = [0u8; 8];
        assert!(matches!(
            MaskWriteRegisterHandler.handle(
                &mut model,
                0x16,
                &[0x00, 0x04, 0x00, 0xF2],
                &mut response
            ),
            Err(SlaveError::RequestTruncated)
        ));
    }
}
