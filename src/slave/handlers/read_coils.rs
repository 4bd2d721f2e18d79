use crate::errors::SlaveError;
use crate::slave::handler::{CommandHandler, Reply};
use crate::slave::model::DataModel;

use super::handle_read_bits;

/// Read Coils (0x01).
pub struct ReadCoilsHandler;

impl CommandHandler for ReadCoilsHandler {
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
            |m, a| m.valid_coil(a),
            |m, a| m.read_coil(a),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slave::handlers::testing::model;

    #[test]
    fn test_read_packs_bits() {
        let mut model = model();
        let mut response = [0u8; 8];

        // Coils 0..=7, of which 2 and 3 are on.
        let reply = ReadCoilsHandler
            .handle(&mut model, 0x01, &[0x00, 0x00, 0x00, 0x08], &mut response)
            .unwrap();
        assert_eq!(reply.function_code, 0x01);
        assert_eq!(&response[..reply.data_len], [0x01, 0x0C]);
    }

    #[test]
    fn test_final_byte_zero_padded() {
        let mut model = model();
        let mut response = [0u8; 8];

        // Nine coils need two bytes; the second carries only bit 0.
        let reply = ReadCoilsHandler
            .handle(&mut model, 0x01, &[0x00, 0x00, 0x00, 0x09], &mut response)
            .unwrap();
        assert_eq!(&response[..reply.data_len], [0x02, 0x0C, 0x00]);
    }

    #[test]
    fn test_bad_quantity() {
        let mut model = model();
        let mut response = [0u8; 8];

        for request in [
            [0x00u8, 0x00, 0x00, 0x00], // zero
            [0x00, 0x00, 0x07, 0xD1],   // 2001
        ] {
            let reply = ReadCoilsHandler
                .handle(&mut model, 0x01, &request, &mut response)
                .unwrap();
            assert_eq!(reply.function_code, 0x81);
            assert_eq!(&response[..reply.data_len], [0x03]);
        }
    }

    #[test]
    fn test_unmapped_range() {
        let mut model = model();
        let mut response = [0u8; 8];

        // Start beyond the block.
        let reply = ReadCoilsHandler
            .handle(&mut model, 0x01, &[0x00, 0x20, 0x00, 0x01], &mut response)
            .unwrap();
        assert_eq!(reply.function_code, 0x81);
        assert_eq!(&response[..reply.data_len], [0x02]);

        // End beyond the block.
        let reply = ReadCoilsHandler
            .handle(&mut model, 0x01, &[0x00, 0x0E, 0x00, 0x04], &mut response)
            .unwrap();
        assert_eq!(&response[..reply.data_len], [0x02]);
    }

    #[test]
    fn test_address_overflow() {
        use crate::slave::MemoryModel;

        // Coil block reaching up to 0xFFFF, so the start address itself is
        // valid and the failure is the range wrapping past 0xFFFF.
        let mut model =
            MemoryModel::with_blocks((0xFFF8, 8), (0, 0), (0, 0), (0, 0));
        let mut response = [0u8; 8];

        let reply = ReadCoilsHandler
            .handle(&mut model, 0x01, &[0xFF, 0xFF, 0x00, 0x02], &mut response)
            .unwrap();
        assert_eq!(reply.function_code, 0x81);
        assert_eq!(&response[..reply.data_len], [0x02]);
    }

    #[test]
    fn test_truncated_request() {
        let mut model = model();
        let mut response = [0u8; 8];
        assert!(matches!(
            ReadCoilsHandler.handle(&mut model, 0x01, &[0x00, 0x00, 0x00], &mut response),
            Err(SlaveError::RequestTruncated)
        ));
    }
}
