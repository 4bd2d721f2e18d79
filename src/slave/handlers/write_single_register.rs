use crate::errors::SlaveError;
use crate::frame::{exception_codes, BufferEmitter, BufferFetcher};
use crate::slave::handler::{exception_reply, CommandHandler, Reply};
use crate::slave::model::DataModel;

/// Write Single Register (0x06).
pub struct WriteSingleRegisterHandler;

impl CommandHandler for WriteSingleRegisterHandler {
    fn handle(
        &self,
        model: &mut dyn DataModel,
        function_code: u8,
        request: &[u8],
        response: &mut [u8],
    ) -> Result<Reply, SlaveError> {
        let mut fetcher = BufferFetcher::new(request);
        let address = fetcher.read_u16_be()?;
        let value = fetcher.read_u16_be()?;

        if !model.valid_holding_register(address) {
            return exception_reply(
                function_code,
                exception_codes::ILLEGAL_DATA_ADDRESS,
                response,
            );
        }

        model.write_holding_register(address, value)?;

        let mut emitter = BufferEmitter::new(response);
        emitter
            .write_u16_be(address)
            .map_err(|_| SlaveError::ResponseTruncated)?;
        emitter
            .write_u16_be(value)
            .map_err(|_| SlaveError::ResponseTruncated)?;

        Ok(Reply {
            function_code,
            data_len: emitter.written_len(),
        })
    }
}
