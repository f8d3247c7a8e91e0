//! Board constants and pin assignments
//!
//! Values from `board.toml` are generated by `build.rs`; pin muxing is
//! fixed by the board layout.

use f4drv_core::clock::{AhbPrescaler, ApbPrescaler, ClockConfig, SysClockSource};
use f4drv_hal_stm32f407::exti::Edge;
use f4drv_hal_stm32f407::gpio::{PinConfig, Pull};
use f4drv_hal_stm32f407::spi::BaudDivider;

include!(concat!(env!("OUT_DIR"), "/board_config.rs"));

/// USART2 TX / RX on port A
pub const CONSOLE_TX: u8 = 2;
pub const CONSOLE_RX: u8 = 3;
pub const CONSOLE_AF: u8 = 7;

/// I2C1 SCL / SDA on port B
pub const I2C_SCL: u8 = 6;
pub const I2C_SDA: u8 = 7;
pub const I2C_AF: u8 = 4;

/// SPI1 SCK / MISO / MOSI on port A
pub const SPI_SCK: u8 = 5;
pub const SPI_MISO: u8 = 6;
pub const SPI_MOSI: u8 = 7;
pub const SPI_AF: u8 = 5;

/// User button on PA0 (active high, external pull-down on most boards)
pub const BUTTON: u8 = 0;
pub const BUTTON_CONFIG: PinConfig = PinConfig::interrupt(Edge::Rising, Pull::Down);
