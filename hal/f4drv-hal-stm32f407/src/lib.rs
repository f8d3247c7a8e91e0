//! STM32F407 register-level drivers for the f4drv stack
//!
//! Layering, bottom to top:
//!
//! - [`ral`] - the register bus ([`ral::Mmio`] on target, `ral::sim::SimBus`
//!   in host tests) and per-peripheral register blocks
//! - [`rcc`] - clock source, prescalers, peripheral clock gates
//! - [`nvic`] - interrupt enable/priority and the vector table numbering
//! - [`exti`] / [`gpio`] - pin configuration and per-line interrupt dispatch
//! - [`i2c`], [`spi`], [`usart`] - polled and interrupt-driven transfer
//!   engines
//!
//! Every driver is generic over [`ral::RegisterIo`], so the same code runs
//! against the simulated bus on the host.
//!
//! # Features
//!
//! - `defmt` - Enable debug formatting and driver logging
//! - `sim` - Export the simulated register bus outside of this crate's tests
//!
//! # Usage
//!
//! ```ignore
//! let p = Peripherals::take().unwrap();
//! let mut rcc = Rcc::new(p.rcc);
//! let clocks = rcc.init(&ClockConfig::default())?;
//! rcc.enable(ClockGate::Usart2);
//! let mut uart = Usart::new(p.usart2, UsartConfig::default());
//! uart.init(clocks.for_bus(UsartInstance::Usart2.bus()))?;
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod error;
pub mod exti;
pub mod gpio;
pub mod i2c;
pub mod nvic;
pub mod ral;
pub mod rcc;
pub mod spi;
pub mod usart;

pub use error::DriverError;
pub use exti::{Edge, Exti, ExtiRegistry};
pub use gpio::{Gpio, GpioPort, PinConfig, PinId};
pub use i2c::{I2c, I2cConfig, I2cInstance};
pub use nvic::{Irq, Nvic};
pub use rcc::{ClockGate, Rcc};
pub use spi::{Spi, SpiConfig, SpiInstance};
pub use usart::{Usart, UsartConfig, UsartInstance};

// Re-export shared types from the core crates
pub use f4drv_core::{Callback, Error, EventCallback, Result, TransferState};

use portable_atomic::{AtomicBool, Ordering};

use exti::{ExtiRegs, SyscfgRegs};
use gpio::GpioRegs;
use i2c::I2cRegs;
use nvic::{NvicRegs, ScbRegs};
use ral::Mmio;
use rcc::RccRegs;
use spi::SpiRegs;
use usart::UsartRegs;

static TAKEN: AtomicBool = AtomicBool::new(false);

/// Every register block on the chip, handed out once
pub struct Peripherals {
    pub rcc: RccRegs<Mmio>,
    pub nvic: NvicRegs<Mmio>,
    pub scb: ScbRegs<Mmio>,
    pub exti: ExtiRegs<Mmio>,
    pub syscfg: SyscfgRegs<Mmio>,

    pub gpioa: GpioRegs<Mmio>,
    pub gpiob: GpioRegs<Mmio>,
    pub gpioc: GpioRegs<Mmio>,
    pub gpiod: GpioRegs<Mmio>,
    pub gpioe: GpioRegs<Mmio>,
    pub gpiof: GpioRegs<Mmio>,
    pub gpiog: GpioRegs<Mmio>,
    pub gpioh: GpioRegs<Mmio>,
    pub gpioi: GpioRegs<Mmio>,

    pub i2c1: I2cRegs<Mmio>,
    pub i2c2: I2cRegs<Mmio>,
    pub i2c3: I2cRegs<Mmio>,

    pub spi1: SpiRegs<Mmio>,
    pub spi2: SpiRegs<Mmio>,
    pub spi3: SpiRegs<Mmio>,
    pub spi4: SpiRegs<Mmio>,
    pub spi5: SpiRegs<Mmio>,
    pub spi6: SpiRegs<Mmio>,

    pub usart1: UsartRegs<Mmio>,
    pub usart2: UsartRegs<Mmio>,
    pub usart3: UsartRegs<Mmio>,
    pub uart4: UsartRegs<Mmio>,
    pub uart5: UsartRegs<Mmio>,
    pub usart6: UsartRegs<Mmio>,
}

impl Peripherals {
    /// Claim the register blocks; `None` after the first call
    pub fn take() -> Option<Self> {
        critical_section::with(|_| {
            if TAKEN.load(Ordering::Relaxed) {
                return None;
            }
            TAKEN.store(true, Ordering::Relaxed);
            Some(Self::new())
        })
    }

    fn new() -> Self {
        let io = Mmio::new();
        Self {
            rcc: RccRegs::new(io),
            nvic: NvicRegs::new(io),
            scb: ScbRegs::new(io),
            exti: ExtiRegs::new(io),
            syscfg: SyscfgRegs::new(io),

            gpioa: GpioRegs::new(io, GpioPort::A),
            gpiob: GpioRegs::new(io, GpioPort::B),
            gpioc: GpioRegs::new(io, GpioPort::C),
            gpiod: GpioRegs::new(io, GpioPort::D),
            gpioe: GpioRegs::new(io, GpioPort::E),
            gpiof: GpioRegs::new(io, GpioPort::F),
            gpiog: GpioRegs::new(io, GpioPort::G),
            gpioh: GpioRegs::new(io, GpioPort::H),
            gpioi: GpioRegs::new(io, GpioPort::I),

            i2c1: I2cRegs::new(io, I2cInstance::I2c1),
            i2c2: I2cRegs::new(io, I2cInstance::I2c2),
            i2c3: I2cRegs::new(io, I2cInstance::I2c3),

            spi1: SpiRegs::new(io, SpiInstance::Spi1),
            spi2: SpiRegs::new(io, SpiInstance::Spi2),
            spi3: SpiRegs::new(io, SpiInstance::Spi3),
            spi4: SpiRegs::new(io, SpiInstance::Spi4),
            spi5: SpiRegs::new(io, SpiInstance::Spi5),
            spi6: SpiRegs::new(io, SpiInstance::Spi6),

            usart1: UsartRegs::new(io, UsartInstance::Usart1),
            usart2: UsartRegs::new(io, UsartInstance::Usart2),
            usart3: UsartRegs::new(io, UsartInstance::Usart3),
            uart4: UsartRegs::new(io, UsartInstance::Uart4),
            uart5: UsartRegs::new(io, UsartInstance::Uart5),
            usart6: UsartRegs::new(io, UsartInstance::Usart6),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_once() {
        let p = Peripherals::take();
        assert!(p.is_some());
        assert!(Peripherals::take().is_none());

        // Handles only carry addresses; nothing is touched
        let p = p.unwrap();
        assert_eq!(p.usart2.base(), 0x4000_4400);
        assert_eq!(p.i2c1.base(), 0x4000_5400);
        assert_eq!(p.spi1.base(), 0x4001_3000);
    }
}
