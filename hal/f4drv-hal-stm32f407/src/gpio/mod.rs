//! GPIO driver
//!
//! Pin configuration for every mode the port supports, including external
//! interrupt pins. Interrupt pins are configured in a fixed order: input
//! mode, edge sensitivity, SYSCFG routing, callback registration, and only
//! then the EXTI unmask, so no edge can latch against a half-configured
//! line.

mod regs;

pub use regs::GpioRegs;

use core::convert::Infallible;

use f4drv_core::{Callback, Error, Result};
use f4drv_hal::gpio::Level;

use crate::exti::{Edge, Exti, ExtiRegistry};
use crate::ral::RegisterIo;

/// Pins per port
pub const PINS_PER_PORT: u8 = 16;

// ============================================================================
// Ports and pins
// ============================================================================

/// GPIO port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpioPort {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
}

impl GpioPort {
    /// Port index (A = 0), also the SYSCFG EXTICR code
    pub const fn index(&self) -> u8 {
        *self as u8
    }

    /// Register block base address
    pub const fn base(&self) -> usize {
        0x4002_0000 + 0x400 * self.index() as usize
    }

    /// Port from its letter
    pub fn from_letter(c: char) -> Option<Self> {
        match c {
            'A' => Some(GpioPort::A),
            'B' => Some(GpioPort::B),
            'C' => Some(GpioPort::C),
            'D' => Some(GpioPort::D),
            'E' => Some(GpioPort::E),
            'F' => Some(GpioPort::F),
            'G' => Some(GpioPort::G),
            'H' => Some(GpioPort::H),
            'I' => Some(GpioPort::I),
            _ => None,
        }
    }
}

/// One pin on one port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinId {
    pub port: GpioPort,
    pub pin: u8,
}

impl PinId {
    /// Create a new pin id, rejecting pins above 15
    pub fn new(port: GpioPort, pin: u8) -> Result<Self> {
        check_pin(pin)?;
        Ok(Self { port, pin })
    }

    /// Parse a pin name such as `"PC3"`
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let rest = s.strip_prefix('P')?;
        let mut chars = rest.chars();
        let port = GpioPort::from_letter(chars.next()?)?;
        let pin: u8 = chars.as_str().parse().ok()?;
        Self::new(port, pin).ok()
    }
}

fn check_pin(pin: u8) -> Result<()> {
    if pin < PINS_PER_PORT {
        Ok(())
    } else {
        Err(Error::InvalidArgument)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Pin function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinMode {
    #[default]
    Input,
    Output,
    /// Alternate function 0-15
    AlternateFunction(u8),
    Analog,
    /// Input with an EXTI line on the given edge(s)
    Interrupt(Edge),
}

impl PinMode {
    const fn moder_bits(&self) -> u32 {
        match self {
            PinMode::Input | PinMode::Interrupt(_) => 0b00,
            PinMode::Output => 0b01,
            PinMode::AlternateFunction(_) => 0b10,
            PinMode::Analog => 0b11,
        }
    }
}

/// Output drive speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Speed {
    #[default]
    Low,
    Medium,
    Fast,
    High,
}

/// Pull resistor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    #[default]
    None,
    Up,
    Down,
}

/// Output stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputType {
    #[default]
    PushPull,
    OpenDrain,
}

/// Pin configuration (defaults to a floating input)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinConfig {
    pub mode: PinMode,
    pub speed: Speed,
    pub pull: Pull,
    pub output_type: OutputType,
}

impl PinConfig {
    /// Push-pull output
    pub const OUTPUT: Self = Self {
        mode: PinMode::Output,
        speed: Speed::Low,
        pull: Pull::None,
        output_type: OutputType::PushPull,
    };

    /// Alternate function, push-pull, high speed
    pub const fn alternate(af: u8) -> Self {
        Self {
            mode: PinMode::AlternateFunction(af),
            speed: Speed::High,
            pull: Pull::None,
            output_type: OutputType::PushPull,
        }
    }

    /// Alternate function, open-drain with pull-up (I2C lines)
    pub const fn alternate_open_drain(af: u8) -> Self {
        Self {
            mode: PinMode::AlternateFunction(af),
            speed: Speed::High,
            pull: Pull::Up,
            output_type: OutputType::OpenDrain,
        }
    }

    /// External interrupt input
    pub const fn interrupt(edge: Edge, pull: Pull) -> Self {
        Self {
            mode: PinMode::Interrupt(edge),
            speed: Speed::Low,
            pull,
            output_type: OutputType::PushPull,
        }
    }
}

// ============================================================================
// GPIO Driver
// ============================================================================

/// Driver for one GPIO port
pub struct Gpio<IO> {
    regs: GpioRegs<IO>,
}

impl<IO: RegisterIo> Gpio<IO> {
    /// Create a new driver over one port's registers
    pub fn new(regs: GpioRegs<IO>) -> Self {
        Self { regs }
    }

    pub fn port(&self) -> GpioPort {
        self.regs.port()
    }

    /// Configure a pin's mode, speed, pull and output type
    ///
    /// For [`PinMode::Interrupt`] only the input stage is set up here; use
    /// [`Gpio::configure_interrupt`] to also arm the EXTI line.
    pub fn configure(&mut self, pin: u8, config: &PinConfig) -> Result<()> {
        check_pin(pin)?;
        if let PinMode::AlternateFunction(af) = config.mode {
            if af > 15 {
                return Err(Error::InvalidArgument);
            }
            self.regs.set_alternate(pin, af);
        }
        self.regs.set_mode(pin, config.mode.moder_bits());
        self.regs.set_speed(pin, config.speed as u32);
        self.regs.set_pull(pin, config.pull as u32);
        self.regs
            .set_output_type(pin, config.output_type == OutputType::OpenDrain);
        Ok(())
    }

    /// Configure an external interrupt pin and register its callback
    ///
    /// `config.mode` must be [`PinMode::Interrupt`]. The EXTI line is
    /// unmasked last.
    pub fn configure_interrupt<'a, E: RegisterIo>(
        &mut self,
        pin: u8,
        config: &PinConfig,
        exti: &mut Exti<E>,
        registry: &mut ExtiRegistry<'a>,
        callback: Callback<'a>,
    ) -> Result<()> {
        let PinMode::Interrupt(edge) = config.mode else {
            return Err(Error::InvalidArgument);
        };
        self.configure(pin, config)?;
        exti.set_edge(pin, edge)?;
        exti.route(self.port(), pin)?;
        registry.register(pin, callback)?;
        exti.unmask(pin)?;
        debug!("gpio: P{}{} armed on {}", self.port(), pin, edge);
        Ok(())
    }

    /// Sample a pin
    pub fn read(&self, pin: u8) -> Result<Level> {
        check_pin(pin)?;
        Ok(Level::from(self.regs.input() & (1 << pin) != 0))
    }

    /// Drive a pin through BSRR
    pub fn write(&mut self, pin: u8, level: Level) -> Result<()> {
        check_pin(pin)?;
        match level {
            Level::High => self.regs.set_reset(1 << pin, 0),
            Level::Low => self.regs.set_reset(0, 1 << pin),
        }
        Ok(())
    }

    /// Invert a pin's output latch
    pub fn toggle(&mut self, pin: u8) -> Result<()> {
        check_pin(pin)?;
        let level = Level::from(self.regs.output() & (1 << pin) != 0);
        self.write(pin, !level)
    }

    /// Sample the whole port
    pub fn read_port(&self) -> u16 {
        self.regs.input() as u16
    }

    /// Write the whole output latch
    pub fn write_port(&mut self, value: u16) {
        self.regs.write_output(value);
    }

    /// Freeze the configuration of the pins in `mask` until reset
    pub fn lock(&mut self, mask: u16) {
        self.regs.lock(mask);
    }
}

impl<IO: RegisterIo + Clone> Gpio<IO> {
    /// Owned handle to one pin of this port
    pub fn pin(&self, pin: u8) -> Result<Pin<IO>> {
        check_pin(pin)?;
        Ok(Pin {
            regs: self.regs.clone(),
            pin,
        })
    }
}

// ============================================================================
// Pin handle
// ============================================================================

/// One pin, usable through the digital I/O traits
///
/// Writes go through BSRR, so pins of the same port can be driven from
/// different contexts without read-modify-write races.
pub struct Pin<IO> {
    regs: GpioRegs<IO>,
    pin: u8,
}

impl<IO: RegisterIo> Pin<IO> {
    pub fn id(&self) -> PinId {
        PinId {
            port: self.regs.port(),
            pin: self.pin,
        }
    }

    fn mask(&self) -> u16 {
        1 << self.pin
    }
}

impl<IO: RegisterIo> f4drv_hal::OutputPin for Pin<IO> {
    fn set_level(&mut self, level: Level) {
        match level {
            Level::High => self.regs.set_reset(self.mask(), 0),
            Level::Low => self.regs.set_reset(0, self.mask()),
        }
    }

    fn output_level(&self) -> Level {
        Level::from(self.regs.output() & self.mask() as u32 != 0)
    }
}

impl<IO: RegisterIo> f4drv_hal::InputPin for Pin<IO> {
    fn level(&self) -> Level {
        Level::from(self.regs.input() & self.mask() as u32 != 0)
    }
}

impl<IO: RegisterIo> embedded_hal::digital::ErrorType for Pin<IO> {
    type Error = Infallible;
}

impl<IO: RegisterIo> embedded_hal::digital::OutputPin for Pin<IO> {
    fn set_low(&mut self) -> core::result::Result<(), Infallible> {
        f4drv_hal::OutputPin::set_low(self);
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Infallible> {
        f4drv_hal::OutputPin::set_high(self);
        Ok(())
    }
}

impl<IO: RegisterIo> embedded_hal::digital::StatefulOutputPin for Pin<IO> {
    fn is_set_high(&mut self) -> core::result::Result<bool, Infallible> {
        Ok(f4drv_hal::OutputPin::output_level(self) == Level::High)
    }

    fn is_set_low(&mut self) -> core::result::Result<bool, Infallible> {
        Ok(f4drv_hal::OutputPin::output_level(self) == Level::Low)
    }
}

impl<IO: RegisterIo> embedded_hal::digital::InputPin for Pin<IO> {
    fn is_high(&mut self) -> core::result::Result<bool, Infallible> {
        Ok(f4drv_hal::InputPin::is_high(self))
    }

    fn is_low(&mut self) -> core::result::Result<bool, Infallible> {
        Ok(f4drv_hal::InputPin::is_low(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exti::{ExtiRegs, SyscfgRegs, EXTI_BASE, SYSCFG_BASE};
    use crate::ral::sim::{Access, SimBus, SimRegs};
    use embedded_hal::digital::{InputPin as _, StatefulOutputPin as _};

    const GPIOC: usize = 0x4002_0800;

    /// BSRR writes land in ODR
    fn bsrr_model(regs: &mut SimRegs, access: &Access) {
        if let Access::Write { addr, value } = *access {
            if addr & 0xFF == 0x18 && (0x4002_0000..0x4002_2400).contains(&addr) {
                let odr = addr - 0x18 + 0x14;
                let set = value & 0xFFFF;
                let reset = value >> 16;
                let next = (regs.get(odr) & !reset) | set;
                regs.set(odr, next);
            }
        }
    }

    #[test]
    fn test_port_bases() {
        assert_eq!(GpioPort::A.base(), 0x4002_0000);
        assert_eq!(GpioPort::C.base(), GPIOC);
        assert_eq!(GpioPort::I.base(), 0x4002_2000);
    }

    #[test]
    fn test_parse_pin() {
        assert_eq!(
            PinId::parse("PC3"),
            Some(PinId {
                port: GpioPort::C,
                pin: 3
            })
        );
        assert_eq!(PinId::parse(" PA15 ").map(|p| p.pin), Some(15));
        assert_eq!(PinId::parse("PA16"), None);
        assert_eq!(PinId::parse("PJ1"), None);
        assert_eq!(PinId::parse("C3"), None);
        assert_eq!(PinId::parse("P"), None);
    }

    #[test]
    fn test_configure_alternate_function() {
        let bus = SimBus::new();
        let mut gpio = Gpio::new(GpioRegs::new(&bus, GpioPort::B));
        let base = GpioPort::B.base();

        gpio.configure(7, &PinConfig::alternate_open_drain(4)).unwrap();
        assert_eq!(bus.peek(base) >> 14 & 0b11, 0b10);
        assert_eq!(bus.peek(base + 0x04), 1 << 7);
        assert_eq!(bus.peek(base + 0x08) >> 14 & 0b11, 0b11);
        assert_eq!(bus.peek(base + 0x0C) >> 14 & 0b11, 0b01);
        assert_eq!(bus.peek(base + 0x20) >> 28, 4);

        gpio.configure(9, &PinConfig::alternate(7)).unwrap();
        assert_eq!(bus.peek(base + 0x24) >> 4 & 0xF, 7);
    }

    #[test]
    fn test_configure_rejects_bad_input() {
        let bus = SimBus::new();
        let mut gpio = Gpio::new(GpioRegs::new(&bus, GpioPort::A));
        assert_eq!(
            gpio.configure(16, &PinConfig::OUTPUT),
            Err(Error::InvalidArgument)
        );
        assert_eq!(
            gpio.configure(1, &PinConfig::alternate(16)),
            Err(Error::InvalidArgument)
        );
        assert!(bus.accesses().is_empty());
    }

    #[test]
    fn test_write_uses_bsrr() {
        let bus = SimBus::new();
        bus.hook(bsrr_model);
        let mut gpio = Gpio::new(GpioRegs::new(&bus, GpioPort::C));

        gpio.write(5, Level::High).unwrap();
        gpio.write(5, Level::Low).unwrap();
        assert_eq!(
            bus.writes_to(GPIOC + 0x18).as_slice(),
            &[1 << 5, 1 << (5 + 16)]
        );
        assert_eq!(bus.reads_of(GPIOC + 0x18), 0);

        gpio.toggle(5).unwrap();
        assert_eq!(bus.peek(GPIOC + 0x14), 1 << 5);
        gpio.toggle(5).unwrap();
        assert_eq!(bus.peek(GPIOC + 0x14), 0);
    }

    #[test]
    fn test_read_samples_idr() {
        let bus = SimBus::new();
        let gpio = Gpio::new(GpioRegs::new(&bus, GpioPort::C));
        bus.poke(GPIOC + 0x10, 1 << 3);
        assert_eq!(gpio.read(3), Ok(Level::High));
        assert_eq!(gpio.read(4), Ok(Level::Low));
        assert_eq!(gpio.read_port(), 1 << 3);
    }

    #[test]
    fn test_pin_traits() {
        let bus = SimBus::new();
        bus.hook(bsrr_model);
        let gpio = Gpio::new(GpioRegs::new(&bus, GpioPort::C));
        let mut pin = gpio.pin(13).unwrap();

        f4drv_hal::OutputPin::set_high(&mut pin);
        assert!(pin.is_set_high().unwrap());
        f4drv_hal::OutputPin::toggle(&mut pin);
        assert!(pin.is_set_low().unwrap());

        bus.poke(GPIOC + 0x10, 1 << 13);
        assert!(pin.is_high().unwrap());
        assert_eq!(
            pin.id(),
            PinId {
                port: GpioPort::C,
                pin: 13
            }
        );
    }

    #[test]
    fn test_interrupt_pin_configuration_order() {
        let bus = SimBus::new();
        let mut gpio = Gpio::new(GpioRegs::new(&bus, GpioPort::C));
        let mut exti = Exti::new(ExtiRegs::new(&bus), SyscfgRegs::new(&bus));
        let mut registry = ExtiRegistry::new();

        fn on_edge() {}
        gpio.configure_interrupt(
            3,
            &PinConfig::interrupt(Edge::Rising, Pull::Down),
            &mut exti,
            &mut registry,
            Callback::Fn(on_edge),
        )
        .unwrap();

        let imr = EXTI_BASE;
        let rtsr = EXTI_BASE + 0x08;
        let exticr1 = SYSCFG_BASE + 0x08;
        let first_write = |addr: usize| bus.position(|a| a.is_write() && a.addr() == addr).unwrap();

        assert!(first_write(rtsr) < first_write(imr));
        assert!(first_write(exticr1) < first_write(imr));
        assert_eq!(bus.peek(exticr1) >> 12 & 0xF, GpioPort::C.index() as u32);
        assert_eq!(bus.peek(imr), 1 << 3);
        assert!(registry.is_registered(3));
    }

    #[test]
    fn test_configure_interrupt_requires_interrupt_mode() {
        let bus = SimBus::new();
        let mut gpio = Gpio::new(GpioRegs::new(&bus, GpioPort::A));
        let mut exti = Exti::new(ExtiRegs::new(&bus), SyscfgRegs::new(&bus));
        let mut registry = ExtiRegistry::new();
        assert_eq!(
            gpio.configure_interrupt(0, &PinConfig::OUTPUT, &mut exti, &mut registry, Callback::Noop),
            Err(Error::InvalidArgument)
        );
        assert!(bus.accesses().is_empty());
    }
}
