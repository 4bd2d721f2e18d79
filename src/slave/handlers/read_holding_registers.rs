use crate::errors::SlaveError;
use crate::slave::handler::{CommandHandler, Reply};
use crate::slave::model::DataModel;

use super::handle_read_registers;

/// Read Holding Registers (0x03).
pub struct ReadHoldingRegistersHandler;

impl CommandHandler for ReadHoldingRegistersHandler {
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
            |m, a| m.valid_holding_register(a),
            |m, a| m.read_holding_register(a),
        )
    }
}
