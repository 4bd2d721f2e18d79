use crate::errors::SlaveError;
use crate::slave::handler::{CommandHandler, Reply};
use crate::slave::model::DataModel;

use super::handle_read_registers;

/// Read Input Registers (0x04).
pub struct ReadInputRegistersHandler;

impl CommandHandler for ReadInputRegistersHandler {
    fn handle(
        &self,
        model: &mut dyn DataModel,
        function_code: u8,
        request: &[u8],
        response: &mut [u8],
    ) -> Result<Reply, SlaveError> {
        handle_read_registers(
            model,
            function_code,
            request,
            response,
            |m, a| m.valid_input_register(a),
            |m, a| m.read_input_register(a),
        )
    }
}
