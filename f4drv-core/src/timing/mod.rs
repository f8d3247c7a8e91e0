//! Bus timing arithmetic
//!
//! Register field values that depend on the bus clock. Callers pass the
//! clock derived by the RCC driver and must recompute after any clock-tree
//! change; nothing here is notified.

pub mod i2c;
pub mod usart;

pub use i2c::FmDuty;
pub use usart::Oversampling;
