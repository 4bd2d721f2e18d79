use crate::errors::SlaveError;
use crate::slave::handler::{CommandHandler, Reply};
use crate::slave::model::DataModel;

use super::handle_read_bits;

/// Read Discrete Inputs (0x02).
pub struct ReadDiscreteInputsHandler;

impl CommandHandler for ReadDiscreteInputsHandler {
    fn handle(
        &self,
        model: &mut dyn DataModel,
        function_code: u8,
        request: &[u8],
        response: &mut [u8],
    ) -> Result<Reply, SlaveError> {
        handle_read_bits(
            model,
            function_code,
            request,
            response,
            |m, a| m.valid_discrete_input(a),
            |m, a| m.read_discrete_input(a),
        )
    }
}
