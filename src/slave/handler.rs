use crate::errors::SlaveError;
use crate::frame::BufferEmitter;

use super::model::DataModel;

/// What a command handler produced: the reply function code (the request's
/// own code on success, `code | 0x80` for an exception) and how many bytes
/// of reply data it wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub function_code: u8,
    pub data_len: usize,
}

/// One per-function-code request parser and reply builder on the slave
/// side.
///
/// Semantic violations (bad quantity, unmapped address) are not errors:
/// the handler answers them with the matching exception reply. An `Err`
/// return means the handler itself failed and makes the poll engine send
/// Server Device Failure (0x04) instead.
pub trait CommandHandler: Send + Sync {
    fn handle(
        &self,
        model: &mut dyn DataModel,
        function_code: u8,
        request: &[u8],
        response: &mut [u8],
    ) -> Result<Reply, SlaveError>;
}

/// Build an exception reply carrying `code`.
pub fn exception_reply(
    function_code: u8,
    code: u8,
    response: &mut [u8],
) -> Result<Reply, SlaveError> {
    let mut emitter = BufferEmitter::new(response);
    emitter
        .write_u8(code)
        .map_err(|_| SlaveError::ResponseTruncated)?;
    Ok(Reply {
        function_code: function_code | 0x80,
        data_len: 1,
    })
}
