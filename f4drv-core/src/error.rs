//! Error and status types shared by every driver

use core::fmt;

/// Driver error
///
/// Only argument, busy-state and configuration failures are reported this
/// way. Bus-protocol errors detected in interrupt context are delivered to
/// the application through callbacks instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Selector or length outside the supported range
    InvalidArgument,
    /// A required buffer was empty or a required handle was absent
    MissingBuffer,
    /// The engine is not `Ready` for the requested direction
    Busy,
    /// Configuration accepted by the type system but not by this driver (PLL)
    Unsupported,
}

/// Result type for driver operations
pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument => write!(f, "argument out of range"),
            Error::MissingBuffer => write!(f, "missing buffer"),
            Error::Busy => write!(f, "engine busy"),
            Error::Unsupported => write!(f, "unsupported configuration"),
        }
    }
}

/// Tri-state status code
///
/// Collapses a [`Result`] into the `OK / NOT_OK / NULL_POINTER` surface used
/// by callers that only need a coarse verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    Ok,
    NotOk,
    NullPointer,
}

impl Status {
    /// Check if this status reports success
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }
}

impl From<Error> for Status {
    fn from(e: Error) -> Self {
        match e {
            Error::MissingBuffer => Status::NullPointer,
            Error::InvalidArgument | Error::Busy | Error::Unsupported => Status::NotOk,
        }
    }
}

impl<T> From<Result<T>> for Status {
    fn from(r: Result<T>) -> Self {
        match r {
            Ok(_) => Status::Ok,
            Err(e) => e.into(),
        }
    }
}

/// Reject an empty buffer
pub fn require_buffer(len: usize) -> Result<()> {
    if len == 0 {
        Err(Error::MissingBuffer)
    } else {
        Ok(())
    }
}
