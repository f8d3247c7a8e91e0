//! Error adapter for the `embedded-hal` / `embedded-io` traits
//!
//! `f4drv_core::Error` lives in another crate, so the ecosystem error
//! traits are implemented on this newtype instead.

use core::fmt;

use f4drv_core::Error;

/// Driver error as seen through ecosystem traits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriverError(pub Error);

impl DriverError {
    /// Underlying driver error
    pub fn inner(&self) -> Error {
        self.0
    }
}

impl From<Error> for DriverError {
    fn from(e: Error) -> Self {
        DriverError(e)
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl embedded_hal::spi::Error for DriverError {
    fn kind(&self) -> embedded_hal::spi::ErrorKind {
        embedded_hal::spi::ErrorKind::Other
    }
}

impl embedded_io::Error for DriverError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.0 {
            Error::InvalidArgument | Error::MissingBuffer => embedded_io::ErrorKind::InvalidInput,
            Error::Busy | Error::Unsupported => embedded_io::ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_kind() {
        use embedded_io::Error as _;
        assert_eq!(
            DriverError(Error::InvalidArgument).kind(),
            embedded_io::ErrorKind::InvalidInput
        );
        assert_eq!(DriverError::from(Error::Busy).kind(), embedded_io::ErrorKind::Other);
    }
}
