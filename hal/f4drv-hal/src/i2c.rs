//! I2C master trait

/// Whether a transaction ends with STOP or keeps the bus for a repeated START
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RepeatedStart {
    /// Release the bus with STOP
    #[default]
    Disabled,
    /// Keep the bus; the next transaction starts with a repeated START
    Enabled,
}

impl RepeatedStart {
    /// Check if STOP should be generated at the end of the transaction
    pub fn sends_stop(&self) -> bool {
        matches!(self, RepeatedStart::Disabled)
    }
}

/// I2C bus master
///
/// Addresses are 7-bit, unshifted.
pub trait I2cBus {
    /// Error type for I2C operations
    type Error;

    /// Write `data` to `address`, ending with STOP
    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error>;

    /// Fill `buf` from `address`, ending with STOP
    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Write `data` then read into `buf` with a repeated START in between
    ///
    /// Typical register access: the write selects the register, the read
    /// fetches its contents.
    fn write_read(&mut self, address: u8, data: &[u8], buf: &mut [u8])
        -> Result<(), Self::Error>;
}
