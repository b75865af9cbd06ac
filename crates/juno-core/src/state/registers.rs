use crate::fault::FaultCode;

/// Default number of register slots.
pub const DEFAULT_REGISTER_COUNT: usize = 8;
/// Smallest register file that still holds both reserved aliases.
pub const MIN_REGISTER_COUNT: usize = 2;
/// Register index that reads as the program counter.
pub const PC_REGISTER: u8 = 0;
/// Register index that reads as the dynamic data base address.
pub const DATA_BASE_REGISTER: u8 = 1;

/// Signed 64-bit register file with two read-only aliases.
///
/// Slot 0 reads as the live program counter and slot 1 as the dynamic data
/// base fixed at load time. Both are owned by the core; program writes to
/// either are faults.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterFile {
    slots: Box<[i64]>,
    pc: u64,
    data_base: u64,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new(DEFAULT_REGISTER_COUNT, 0)
    }
}

impl RegisterFile {
    /// Creates a zeroed register file. Counts below [`MIN_REGISTER_COUNT`] are raised to it.
    #[must_use]
    pub fn new(count: usize, data_base: u64) -> Self {
        Self {
            slots: vec![0; count.max(MIN_REGISTER_COUNT)].into_boxed_slice(),
            pc: 0,
            data_base,
        }
    }

    /// Number of addressable registers, aliases included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false; the file holds at least the two aliases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Reads a register.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::InvalidRegister`] when `index` is outside the file.
    #[allow(clippy::cast_possible_wrap)]
    pub fn read(&self, index: u8) -> Result<i64, FaultCode> {
        match index {
            PC_REGISTER => Ok(self.pc as i64),
            DATA_BASE_REGISTER => Ok(self.data_base as i64),
            _ => self
                .slots
                .get(usize::from(index))
                .copied()
                .ok_or(FaultCode::InvalidRegister),
        }
    }

    /// Writes a general-purpose register.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::ReservedRegisterWrite`] for slots 0 and 1 and
    /// [`FaultCode::InvalidRegister`] when `index` is outside the file.
    pub fn write(&mut self, index: u8, value: i64) -> Result<(), FaultCode> {
        self.check_writable(index)?;
        let slot = self
            .slots
            .get_mut(usize::from(index))
            .ok_or(FaultCode::InvalidRegister)?;
        *slot = value;
        Ok(())
    }

    /// Checks that a later [`RegisterFile::write`] to `index` would succeed.
    ///
    /// # Errors
    ///
    /// Same conditions as [`RegisterFile::write`].
    pub fn check_writable(&self, index: u8) -> Result<(), FaultCode> {
        if index == PC_REGISTER || index == DATA_BASE_REGISTER {
            return Err(FaultCode::ReservedRegisterWrite);
        }
        if usize::from(index) >= self.slots.len() {
            return Err(FaultCode::InvalidRegister);
        }
        Ok(())
    }

    /// Reads the program counter.
    #[must_use]
    pub const fn pc(&self) -> u64 {
        self.pc
    }

    /// Core-owned update path for the program counter.
    pub const fn set_pc(&mut self, value: u64) {
        self.pc = value;
    }

    /// Reads the dynamic data base address.
    #[must_use]
    pub const fn data_base(&self) -> u64 {
        self.data_base
    }

    /// Returns every register value in index order, aliases resolved.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn dump(&self) -> Vec<i64> {
        let mut values = self.slots.to_vec();
        values[usize::from(PC_REGISTER)] = self.pc as i64;
        values[usize::from(DATA_BASE_REGISTER)] = self.data_base as i64;
        values
    }
}
