//! Serial traits and frame-format types

/// Serial transmitter
pub trait UartTx {
    /// Error type for transmit operations
    type Error;

    /// Send `data`, returning once the last frame has left the shifter
    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Wait for transmission complete
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Serial receiver
pub trait UartRx {
    /// Error type for receive operations
    type Error;

    /// Fill `buf`, returning the number of bytes stored
    fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Receive one byte
    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        let mut byte = [0u8; 1];
        self.read_blocking(&mut byte)?;
        Ok(byte[0])
    }
}

/// Word length, parity bit included
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataBits {
    #[default]
    Eight,
    Nine,
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

/// Stop bit count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    #[default]
    One,
    Half,
    Two,
    OneAndHalf,
}
