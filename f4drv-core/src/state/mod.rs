//! Transfer state machine
//!
//! Every protocol engine tracks each transfer direction with the same
//! three-state machine. Transitions are explicit, finite, and deterministic:
//! an engine only starts a transfer from `Ready` and always returns there on
//! completion, error, or explicit stop.

pub mod events;
pub mod machine;

pub use events::{I2cEvent, TransferEvent};
pub use machine::TransferState;
