use crate::errors::SlaveError;

/// Application data backing a slave: the four Modbus object tables.
///
/// The validity predicates drive the Illegal Data Address checks in the
/// command handlers; the accessors are only called for addresses that
/// passed them. An accessor failure is wrapped into a Server Device
/// Failure exception by the poll engine.
pub trait DataModel: Send {
    fn valid_coil(&self, address: u16) -> bool;
    fn valid_discrete_input(&self, address: u16) -> bool;
    fn valid_holding_register(&self, address: u16) -> bool;
    fn valid_input_register(&self, address: u16) -> bool;

    fn read_coil(&mut self, address: u16) -> Result<bool, SlaveError>;
    fn write_coil(&mut self, address: u16, value: bool) -> Result<(), SlaveError>;
    fn read_discrete_input(&mut self, address: u16) -> Result<bool, SlaveError>;
    fn read_holding_register(&mut self, address: u16) -> Result<u16, SlaveError>;
    fn write_holding_register(&mut self, address: u16, value: u16) -> Result<(), SlaveError>;
    fn read_input_register(&mut self, address: u16) -> Result<u16, SlaveError>;
}

#[derive(Debug, Clone)]
struct Block<T> {
    start: u16,
    values: Vec<T>,
}

impl<T: Copy + Default> Block<T> {
    fn new(start: u16, count: u16) -> Self {
        Self {
            start,
            values: vec![T::default(); count as usize],
        }
    }

    fn contains(&self, address: u16) -> bool {
        address >= self.start && ((address - self.start) as usize) < self.values.len()
    }

    fn get(&self, address: u16) -> Result<T, SlaveError> {
        self.values
            .get((address.wrapping_sub(self.start)) as usize)
            .copied()
            .ok_or_else(|| SlaveError::Callback("address outside the mapped block".into()))
    }

    fn set(&mut self, address: u16, value: T) -> Result<(), SlaveError> {
        let slot = self
            .values
            .get_mut((address.wrapping_sub(self.start)) as usize)
            .ok_or_else(|| SlaveError::Callback("address outside the mapped block".into()))?;
        *slot = value;
        Ok(())
    }
}

/// Plain in-memory [`DataModel`]: four zero-initialized blocks starting at
/// configurable base addresses. Used by the slave simulator binary and the
/// test suites.
#[derive(Debug, Clone)]
pub struct MemoryModel {
    coils: Block<bool>,
    discrete_inputs: Block<bool>,
    holding_registers: Block<u16>,
    input_registers: Block<u16>,
}

impl MemoryModel {
    /// All four blocks based at address zero.
    pub fn new(
        coil_count: u16,
        discrete_input_count: u16,
        holding_register_count: u16,
        input_register_count: u16,
    ) -> Self {
        Self::with_blocks(
            (0, coil_count),
            (0, discrete_input_count),
            (0, holding_register_count),
            (0, input_register_count),
        )
    }

    /// Blocks at explicit `(start, count)` base addresses.
    pub fn with_blocks(
        coils: (u16, u16),
        discrete_inputs: (u16, u16),
        holding_registers: (u16, u16),
        input_registers: (u16, u16),
    ) -> Self {
        Self {
            coils: Block::new(coils.0, coils.1),
            discrete_inputs: Block::new(discrete_inputs.0, discrete_inputs.1),
            holding_registers: Block::new(holding_registers.0, holding_registers.1),
            input_registers: Block::new(input_registers.0, input_registers.1),
        }
    }

    /// Seed a discrete input (they are read-only on the wire).
    pub fn set_discrete_input(&mut self, address: u16, value: bool) -> Result<(), SlaveError> {
        self.discrete_inputs.set(address, value)
    }

    /// Seed an input register (they are read-only on the wire).
    pub fn set_input_register(&mut self, address: u16, value: u16) -> Result<(), SlaveError> {
        self.input_registers.set(address, value)
    }
}

impl DataModel for MemoryModel {
    fn valid_coil(&self, address: u16) -> bool {
        self.coils.contains(address)
    }

    fn valid_discrete_input(&self, address: u16) -> bool {
        self.discrete_inputs.contains(address)
    }

    fn valid_holding_register(&self, address: u16) -> bool {
        self.holding_registers.contains(address)
    }

    fn valid_input_register(&self, address: u16) -> bool {
        self.input_registers.contains(address)
    }

    fn read_coil(&mut self, address: u16) -> Result<bool, SlaveError> {
        self.coils.get(address)
    }

    fn write_coil(&mut self, address: u16, value: bool) -> Result<(), SlaveError> {
        self.coils.set(address, value)
    }

    fn read_discrete_input(&mut self, address: u16) -> Result<bool, SlaveError> {
        self.discrete_inputs.get(address)
    }

    fn read_holding_register(&mut self, address: u16) -> Result<u16, SlaveError> {
        self.holding_registers.get(address)
    }

    fn write_holding_register(&mut self, address: u16, value: u16) -> Result<(), SlaveError> {
        self.holding_registers.set(address, value)
    }

    fn read_input_register(&mut self, address: u16) -> Result<u16, SlaveError> {
        self.input_registers.get(address)
    }
}
