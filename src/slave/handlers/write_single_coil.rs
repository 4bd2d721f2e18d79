use crate::errors::SlaveError;
use crate::frame::{exception_codes, limits, BufferEmitter, BufferFetcher};
use crate::slave::handler::{exception_reply, CommandHandler, Reply};
use crate::slave::model::DataModel;

/// Write Single Coil (0x05).
pub struct WriteSingleCoilHandler;

impl CommandHandler for WriteSingleCoilHandler {
    fn handle(
        &self,
        model: &mut dyn DataModel,
        function_code: u8,
        request: &[u8],
        response: &mut [u8],
    ) -> Result<Reply, SlaveError> {
        let mut fetcher = BufferFetcher::new(request);
        let address = fetcher.read_u16_be()?;
        let encoded = fetcher.read_u16_be()?;

        let value = match encoded {
            limits::COIL_ON => true,
            limits::COIL_OFF => false,
            _ => {
                return exception_reply(
                    function_code,
                    exception_codes::ILLEGAL_DATA_VALUE,
                    response,
                )
            }
        };
        if !model.valid_coil(address) {
            return exception_reply(
                function_code,
                exception_codes::ILLEGAL_DATA_ADDRESS,
                response,
            );
        }

        model.write_coil(address, value)?;

        // The reply echoes the request.
        let mut emitter = BufferEmitter::new(response);
        emitter
            .write_u16_be(address)
            .map_err(|_| SlaveError::ResponseTruncated)?;
        emitter
            .write_u16_be(encoded)
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
    fn test_write_and_echo() {
        let mut model = model();
        let mut response = [0u8; 8];

        let reply = WriteSingleCoilHandler
            .handle(&mut model, 0x05, &[0x00, 0x07, 0xFF, 0x00], &mut response)
            .unwrap();
        assert_eq!(reply.function_code, 0x05);
        assert_eq!(&response[..reply.data_len], [0x00, 0x07, 0xFF, 0x00]);
        assert!(model.read_coil(7).unwrap());

        let reply = WriteSingleCoilHandler
            .handle(&mut model, 0x05, &[0x00, 0x07, 0x00, 0x00], &mut response)
            .unwrap();
        assert_eq!(&response[..reply.data_len], [0x00, 0x07, 0x00, 0x00]);
        assert!(!model.read_coil(7).unwrap());
    }

    #[test]
    fn test_bad_value_encoding() {
        let mut model = model();
        let mut response = [0u8; 8];

        let reply = WriteSingleCoilHandler
            .handle(&mut model, 0x05, &[0x00, 0x07, 0xFF, 0x01], &mut response)
            .unwrap();
        assert_eq!(reply.function_code, 0x85);
        assert_eq!(&response[..reply.data_len], [0x03]);
    }

    #[test]
    fn test_unmapped_address() {
        let mut model = model();
        let mut response = [0u8; 8];

        let reply = WriteSingleCoilHandler
            .handle(&mut model, 0x05, &[0x00, 0x60, 0xFF, 0x00], &mut response)
            .unwrap();
        assert_eq!(reply.function_code, 0x85);
        assert_eq!(&response[..reply.data_len], [0x02]);
    }

    #[test]
    fn test_truncated_request() {
        let mut model = model();
        let mut response = [0u8; 8];
        assert!(matches!(
            WriteSingleCoilHandler.handle(&mut model, 0x05, &[0x00, 0x07, 0xFF], &mut response),
            Err(SlaveError::RequestTruncated)
        ));
    }
}
