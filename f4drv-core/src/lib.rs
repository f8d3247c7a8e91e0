//! Board-agnostic core logic for the f4drv driver stack
//!
//! This crate contains everything that does not need to touch a register:
//!
//! - Error and status taxonomy shared by every driver
//! - Clock-tree arithmetic (prescaler tables, bus clock derivation)
//! - Bus timing arithmetic (I2C CCR/TRISE, USART BRR)
//! - Transfer state machine and transfer descriptors
//! - Callback slots used by interrupt dispatch and the transfer engines

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod callback;
pub mod clock;
pub mod error;
pub mod state;
pub mod timing;
pub mod transfer;

pub use callback::{Callback, EventCallback};
pub use error::{Error, Result, Status};
pub use state::{I2cEvent, TransferEvent, TransferState};
