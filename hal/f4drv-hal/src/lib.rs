//! f4drv hardware abstraction traits
//!
//! Chip-independent traits implemented by the STM32F407 driver crate, so
//! that device drivers and application code can be written against a bus
//! rather than a register block.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (f4drv-firmware)           │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  f4drv-hal (this crate - traits)        │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  f4drv-hal-stm32f407 (registers)        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::OutputPin`], [`gpio::InputPin`] - Digital I/O
//! - [`uart::UartTx`], [`uart::UartRx`] - Serial communication
//! - [`i2c::I2cBus`] - I2C master transactions
//! - [`spi::SpiBus`] - SPI full-duplex transfers

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod i2c;
pub mod spi;
pub mod uart;

pub use gpio::{InputPin, Level, OutputPin};
pub use i2c::{I2cBus, RepeatedStart};
pub use spi::{Mode, Phase, Polarity, SpiBus};
pub use uart::{DataBits, Parity, StopBits, UartRx, UartTx};
