use std::sync::Arc;

use crate::errors::SlaveError;
use crate::frame::{function_codes, MAX_FUNCTION_CODE};

use super::handler::CommandHandler;
use super::handlers;

/// Per-entry dispatch policy.
#[derive(Debug, Clone, Copy)]
pub struct CommandOptions {
    /// Execute (without replying) when the request was a broadcast.
    pub broadcast_allowed: bool,
    /// Execute (without replying) while the slave is in listen-only mode.
    pub listen_only_allowed: bool,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            broadcast_allowed: false,
            listen_only_allowed: false,
        }
    }
}

pub struct CommandEntry {
    pub(crate) function_code: u8,
    pub(crate) handler: Arc<dyn CommandHandler>,
    pub(crate) options: CommandOptions,
}

/// Function-code dispatch table: sorted-compact entries, binary-searched.
pub struct CommandTable {
    entries: Vec<CommandEntry>,
    capacity: usize,
}

impl CommandTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    /// Table pre-loaded with the complete built-in command catalog.
    ///
    /// The write commands 0x05/0x06/0x0F/0x10 execute on broadcasts;
    /// nothing executes in listen-only mode.
    pub fn with_builtin() -> Self {
        let mut table = Self::with_capacity(16);

        let read = CommandOptions::default();
        let write = CommandOptions {
            broadcast_allowed: true,
            ..Default::default()
        };

        let builtin: [(u8, Arc<dyn CommandHandler>, CommandOptions); 10] = [
            (
                function_codes::READ_COILS,
                Arc::new(handlers::ReadCoilsHandler),
                read,
            ),
            (
                function_codes::READ_DISCRETE_INPUTS,
                Arc::new(handlers::ReadDiscreteInputsHandler),
                read,
            ),
            (
                function_codes::READ_HOLDING_REGISTERS,
                Arc::new(handlers::ReadHoldingRegistersHandler),
                read,
            ),
            (
                function_codes::READ_INPUT_REGISTERS,
                Arc::new(handlers::ReadInputRegistersHandler),
                read,
            ),
            (
                function_codes::WRITE_SINGLE_COIL,
                Arc::new(handlers::WriteSingleCoilHandler),
                write,
            ),
            (
                function_codes::WRITE_SINGLE_REGISTER,
                Arc::new(handlers::WriteSingleRegisterHandler),
                write,
            ),
            (
                function_codes::WRITE_MULTIPLE_COILS,
                Arc::new(handlers::WriteMultipleCoilsHandler),
                write,
            ),
            (
                function_codes::WRITE_MULTIPLE_REGISTERS,
                Arc::new(handlers::WriteMultipleRegistersHandler),
                write,
            ),
            (
                function_codes::MASK_WRITE_REGISTER,
                Arc::new(handlers::MaskWriteRegisterHandler),
                read,
            ),
            (
                function_codes::READ_WRITE_MULTIPLE_REGISTERS,
                Arc::new(handlers::ReadWriteMultipleRegistersHandler),
                read,
            ),
        ];

        for (function_code, handler, options) in builtin {
            table
                .register(function_code, handler, options)
                .expect("built-in catalog registers cleanly");
        }
        table
    }

    pub fn register(
        &mut self,
        function_code: u8,
        handler: Arc<dyn CommandHandler>,
        options: CommandOptions,
    ) -> Result<(), SlaveError> {
        if function_code == 0 || function_code > MAX_FUNCTION_CODE {
            return Err(SlaveError::InvalidFunctionCode(function_code));
        }
        if self.entries.len() == self.capacity {
            return Err(SlaveError::TableFull(self.capacity));
        }
        match self
            .entries
            .binary_search_by_key(&function_code, |e| e.function_code)
        {
            Ok(_) => Err(SlaveError::FunctionCodeExists(function_code)),
            Err(position) => {
                self.entries.insert(
                    position,
                    CommandEntry {
                        function_code,
                        handler,
                        options,
                    },
                );
                Ok(())
            }
        }
    }

    pub fn lookup(&self, function_code: u8) -> Option<&CommandEntry> {
        self.entries
            .binary_search_by_key(&function_code, |e| e.function_code)
            .ok()
            .map(|position| &self.entries[position])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let codes: Vec<u8> = self.entries.iter().map(|e| e.function_code).collect();
        f.debug_struct("CommandTable")
            .field("function_codes", &codes)
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slave::handler::Reply;
    use crate::slave::DataModel;

    struct NopHandler;

    impl CommandHandler for NopHandler {
        fn handle(
            &self,
            _model: &mut dyn DataModel,
            function_code: u8,
            _request: &[u8],
            _response: &mut [u8],
        ) -> Result<Reply, SlaveError> {
            Ok(Reply {
                function_code,
                data_len: 0,
            })
        }
    }

    #[test]
    fn test_entries_stay_sorted() {
        let mut table = CommandTable::with_capacity(8);
        for function_code in [0x10u8, 0x03, 0x7F, 0x01] {
            table
                .register(function_code, Arc::new(NopHandler), CommandOptions::default())
                .unwrap();
        }
        let codes: Vec<u8> = table.entries.iter().map(|e| e.function_code).collect();
        assert_eq!(codes, [0x01, 0x03, 0x10, 0x7F]);

        assert!(table.lookup(0x03).is_some());
        assert!(table.lookup(0x7F).is_some());
        assert!(table.lookup(0x02).is_none());
    }

    #[test]
    fn test_rejects_invalid_and_duplicate_codes() {
        let mut table = CommandTable::with_capacity(8);
        assert!(matches!(
            table.register(0, Arc::new(NopHandler), CommandOptions::default()),
            Err(SlaveError::InvalidFunctionCode(0))
        ));
        assert!(matches!(
            table.register(0x80, Arc::new(NopHandler), CommandOptions::default()),
            Err(SlaveError::InvalidFunctionCode(0x80))
        ));

        table
            .register(0x03, Arc::new(NopHandler), CommandOptions::default())
            .unwrap();
        assert!(matches!(
            table.register(0x03, Arc::new(NopHandler), CommandOptions::default()),
            Err(SlaveError::FunctionCodeExists(0x03))
        ));
    }

    #[test]
    fn test_capacity_bound() {
        let mut table = CommandTable::with_capacity(1);
        table
            .register(0x01, Arc::new(NopHandler), CommandOptions::default())
            .unwrap();
        assert!(matches!(
            table.register(0x02, Arc::new(NopHandler), CommandOptions::default()),
            Err(SlaveError::TableFull(1))
        ));
    }

    #[test]
    fn test_builtin_catalog() {
        let table = CommandTable::with_builtin();
        assert_eq!(table.len(), 10);
        for function_code in [0x01u8, 0x02, 0x03, 0x04, 0x05, 0x06, 0x0F, 0x10, 0x16, 0x17] {
            assert!(table.lookup(function_code).is_some());
        }
        assert!(table.lookup(0x05).unwrap().options.broadcast_allowed);
        assert!(!table.lookup(0x01).unwrap().options.broadcast_allowed);
        assert!(!table.lookup(0x05).unwrap().options.listen_only_allowed);
    }
}
