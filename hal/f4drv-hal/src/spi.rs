//! SPI master trait and clock-mode types

/// SPI bus master
pub trait SpiBus {
    /// Error type for SPI operations
    type Error;

    /// Clock `write` out while clocking into `read`
    ///
    /// Both slices must have the same length.
    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error>;

    /// Clock `data` out, discarding what comes back
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Clock zeros out, storing what comes back in `buf`
    fn read(&mut self, buf: &mut [u8]) -> Result<(), Self::Error>;
}

/// Clock polarity (CPOL)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// SCK idles low
    #[default]
    IdleLow,
    /// SCK idles high
    IdleHigh,
}

/// Clock phase (CPHA)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Sample on the first edge
    #[default]
    FirstEdge,
    /// Sample on the second edge
    SecondEdge,
}

/// Combined CPOL/CPHA mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Mode0,
    Mode1,
    Mode2,
    Mode3,
}

impl Mode {
    /// Split into polarity and phase
    pub fn split(self) -> (Polarity, Phase) {
        match self {
            Mode::Mode0 => (Polarity::IdleLow, Phase::FirstEdge),
            Mode::Mode1 => (Polarity::IdleLow, Phase::SecondEdge),
            Mode::Mode2 => (Polarity::IdleHigh, Phase::FirstEdge),
            Mode::Mode3 => (Polarity::IdleHigh, Phase::SecondEdge),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_split() {
        assert_eq!(Mode::Mode0.split(), (Polarity::IdleLow, Phase::FirstEdge));
        assert_eq!(Mode::Mode3.split(), (Polarity::IdleHigh, Phase::SecondEdge));
    }
}
