//! Clock & Reset Controller
//!
//! Selects the system clock source, programs the bus prescalers, and gates
//! or resets individual peripherals. Bus frequencies are always derived
//! from what the registers currently say, so they stay correct however the
//! clock tree was reached.
//!
//! Oscillator ready waits and the switch-status wait are busy-waits with no
//! timeout: a crystal that never starts hangs [`Rcc::init`].

mod regs;

pub use regs::{enable_register, reset_register, RccRegs, RCC_BASE, RCC_CFGR, RCC_CR};

use f4drv_core::clock::{Bus, BusClocks, ClockConfig, SysClockSource};
use f4drv_core::{Error, Result};

use crate::ral::RegisterIo;

// ============================================================================
// Clock gates
// ============================================================================

/// Peripheral clock gate
///
/// Each gate is one bit in the enable/reset register pair of its bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockGate {
    GpioA,
    GpioB,
    GpioC,
    GpioD,
    GpioE,
    GpioF,
    GpioG,
    GpioH,
    GpioI,
    Rng,
    OtgFs,
    Spi2,
    Spi3,
    Usart2,
    Usart3,
    Uart4,
    Uart5,
    I2c1,
    I2c2,
    I2c3,
    Usart1,
    Usart6,
    Spi1,
    Spi4,
    Syscfg,
    Spi5,
    Spi6,
}

impl ClockGate {
    /// Every gate this driver knows about
    pub const ALL: [ClockGate; 27] = [
        ClockGate::GpioA,
        ClockGate::GpioB,
        ClockGate::GpioC,
        ClockGate::GpioD,
        ClockGate::GpioE,
        ClockGate::GpioF,
        ClockGate::GpioG,
        ClockGate::GpioH,
        ClockGate::GpioI,
        ClockGate::Rng,
        ClockGate::OtgFs,
        ClockGate::Spi2,
        ClockGate::Spi3,
        ClockGate::Usart2,
        ClockGate::Usart3,
        ClockGate::Uart4,
        ClockGate::Uart5,
        ClockGate::I2c1,
        ClockGate::I2c2,
        ClockGate::I2c3,
        ClockGate::Usart1,
        ClockGate::Usart6,
        ClockGate::Spi1,
        ClockGate::Spi4,
        ClockGate::Syscfg,
        ClockGate::Spi5,
        ClockGate::Spi6,
    ];

    /// Bus and bit position of this gate
    pub const fn bus_bit(&self) -> (Bus, u8) {
        use ClockGate::*;
        match self {
            GpioA => (Bus::Ahb1, 0),
            GpioB => (Bus::Ahb1, 1),
            GpioC => (Bus::Ahb1, 2),
            GpioD => (Bus::Ahb1, 3),
            GpioE => (Bus::Ahb1, 4),
            GpioF => (Bus::Ahb1, 5),
            GpioG => (Bus::Ahb1, 6),
            GpioH => (Bus::Ahb1, 7),
            GpioI => (Bus::Ahb1, 8),
            Rng => (Bus::Ahb2, 6),
            OtgFs => (Bus::Ahb2, 7),
            Spi2 => (Bus::Apb1, 14),
            Spi3 => (Bus::Apb1, 15),
            Usart2 => (Bus::Apb1, 17),
            Usart3 => (Bus::Apb1, 18),
            Uart4 => (Bus::Apb1, 19),
            Uart5 => (Bus::Apb1, 20),
            I2c1 => (Bus::Apb1, 21),
            I2c2 => (Bus::Apb1, 22),
            I2c3 => (Bus::Apb1, 23),
            Usart1 => (Bus::Apb2, 4),
            Usart6 => (Bus::Apb2, 5),
            Spi1 => (Bus::Apb2, 12),
            Spi4 => (Bus::Apb2, 13),
            Syscfg => (Bus::Apb2, 14),
            Spi5 => (Bus::Apb2, 20),
            Spi6 => (Bus::Apb2, 21),
        }
    }

    /// Bus this gate sits on
    pub const fn bus(&self) -> Bus {
        self.bus_bit().0
    }

    /// Look up a gate from a raw bus/bit pair
    ///
    /// Bits outside the defined peripheral set are rejected.
    pub fn from_bus_bit(bus: Bus, bit: u8) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|g| g.bus_bit() == (bus, bit))
            .ok_or(Error::InvalidArgument)
    }
}

// ============================================================================
// RCC Driver
// ============================================================================

/// Clock & reset driver
pub struct Rcc<IO> {
    regs: RccRegs<IO>,
}

impl<IO: RegisterIo> Rcc<IO> {
    /// Create a new driver over the RCC registers
    pub fn new(regs: RccRegs<IO>) -> Self {
        Self { regs }
    }

    /// Register handle
    pub fn regs(&self) -> &RccRegs<IO> {
        &self.regs
    }

    /// Program prescalers, then switch the system clock
    ///
    /// Prescalers go first so the buses never run above their limits during
    /// the switch. A PLL source is rejected before any register is touched.
    pub fn init(&mut self, config: &ClockConfig) -> Result<BusClocks> {
        if config.source == SysClockSource::Pll {
            warn!("rcc: PLL source not supported");
            return Err(Error::Unsupported);
        }

        self.regs.set_ahb_prescaler(config.ahb);
        self.regs.set_apb1_prescaler(config.apb1);
        self.regs.set_apb2_prescaler(config.apb2);
        self.select_source(config.source)?;

        let clocks = self.bus_clocks()?;
        info!(
            "rcc: sysclk={} hclk={} pclk1={} pclk2={}",
            clocks.sysclk_hz,
            clocks.hclk_hz,
            clocks.pclk1_hz,
            clocks.pclk2_hz
        );
        Ok(clocks)
    }

    /// Switch the system clock source
    ///
    /// The new oscillator is started and awaited before the switch, and the
    /// old one is stopped only once SWS confirms the switch.
    pub fn select_source(&mut self, source: SysClockSource) -> Result<()> {
        match source {
            SysClockSource::Hsi => {
                self.regs.set_hsi(true);
                self.regs.wait_hsi_ready();
                self.switch_to(source);
                self.regs.set_hse(false);
            }
            SysClockSource::HseCrystal | SysClockSource::HseBypass => {
                let bypass = source == SysClockSource::HseBypass;
                if self.regs.hse_enabled() && self.regs.hse_bypass() != bypass {
                    // HSEBYP can only change with HSE stopped
                    self.select_source(SysClockSource::Hsi)?;
                    self.regs.wait_hse_stopped();
                }
                self.regs.set_hse_bypass(bypass);
                self.regs.set_hse(true);
                self.regs.wait_hse_ready();
                self.switch_to(source);
                self.regs.set_hsi(false);
            }
            SysClockSource::Pll => return Err(Error::Unsupported),
        }
        info!("rcc: system clock source {}", source);
        Ok(())
    }

    fn switch_to(&mut self, source: SysClockSource) {
        let sw = source.switch_bits();
        self.regs.set_switch(sw);
        self.regs.wait_switch_status(sw);
    }

    /// Active system clock source, decoded from SWS
    pub fn clock_source(&self) -> Result<SysClockSource> {
        SysClockSource::from_switch_status(self.regs.switch_status(), self.regs.hse_bypass())
    }

    /// Bus clocks derived from the current register state
    pub fn bus_clocks(&self) -> Result<BusClocks> {
        BusClocks::derive(
            self.clock_source()?,
            self.regs.ahb_prescaler(),
            self.regs.apb1_prescaler(),
            self.regs.apb2_prescaler(),
        )
    }

    pub fn sysclk_hz(&self) -> Result<u32> {
        Ok(self.bus_clocks()?.sysclk_hz)
    }

    pub fn hclk_hz(&self) -> Result<u32> {
        Ok(self.bus_clocks()?.hclk_hz)
    }

    pub fn apb1_hz(&self) -> Result<u32> {
        Ok(self.bus_clocks()?.pclk1_hz)
    }

    pub fn apb2_hz(&self) -> Result<u32> {
        Ok(self.bus_clocks()?.pclk2_hz)
    }

    /// Clock feeding peripherals on `bus`
    pub fn pclk_for(&self, bus: Bus) -> Result<u32> {
        Ok(self.bus_clocks()?.for_bus(bus))
    }

    /// Enable a peripheral clock
    pub fn enable(&mut self, gate: ClockGate) {
        let (bus, bit) = gate.bus_bit();
        self.regs.set_enable(bus, bit, true);
    }

    /// Disable a peripheral clock
    pub fn disable(&mut self, gate: ClockGate) {
        let (bus, bit) = gate.bus_bit();
        self.regs.set_enable(bus, bit, false);
    }

    /// Check if a peripheral clock is enabled
    pub fn is_enabled(&self, gate: ClockGate) -> bool {
        let (bus, bit) = gate.bus_bit();
        self.regs.is_enabled(bus, bit)
    }

    /// Reset a peripheral
    pub fn reset(&mut self, gate: ClockGate) {
        let (bus, bit) = gate.bus_bit();
        self.regs.pulse_reset(bus, bit);
    }

    /// Enable a peripheral clock by raw bus/bit index
    pub fn enable_raw(&mut self, bus: Bus, bit: u8) -> Result<()> {
        let gate = ClockGate::from_bus_bit(bus, bit)?;
        self.enable(gate);
        Ok(())
    }

    /// Disable a peripheral clock by raw bus/bit index
    pub fn disable_raw(&mut self, bus: Bus, bit: u8) -> Result<()> {
        let gate = ClockGate::from_bus_bit(bus, bit)?;
        self.disable(gate);
        Ok(())
    }

    /// Reset a peripheral by raw bus/bit index
    pub fn reset_raw(&mut self, bus: Bus, bit: u8) -> Result<()> {
        let gate = ClockGate::from_bus_bit(bus, bit)?;
        self.reset(gate);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ral::sim::{Access, SimBus, SimRegs};
    use f4drv_core::clock::{AhbPrescaler, ApbPrescaler};

    /// Oscillators come up at once and SWS follows SW
    fn rcc_model(regs: &mut SimRegs, access: &Access) {
        if let Access::Write { addr, value } = *access {
            if addr == RCC_CR {
                let mut cr = value & !(regs::CR_HSIRDY | regs::CR_HSERDY);
                if value & regs::CR_HSION != 0 {
                    cr |= regs::CR_HSIRDY;
                }
                if value & regs::CR_HSEON != 0 {
                    cr |= regs::CR_HSERDY;
                }
                regs.set(RCC_CR, cr);
            } else if addr == RCC_CFGR {
                let sw = value & 0x3;
                regs.set(RCC_CFGR, (value & !0xC) | (sw << 2));
            }
        }
    }

    fn rcc(bus: &SimBus) -> Rcc<&SimBus> {
        bus.poke(RCC_CR, regs::CR_HSION | regs::CR_HSIRDY);
        bus.hook(rcc_model);
        Rcc::new(RccRegs::new(bus))
    }

    #[test]
    fn test_reset_state_is_hsi_16mhz() {
        let bus = SimBus::new();
        let rcc = rcc(&bus);
        assert_eq!(rcc.clock_source(), Ok(SysClockSource::Hsi));
        assert_eq!(rcc.apb1_hz(), Ok(16_000_000));
        assert_eq!(rcc.apb2_hz(), Ok(16_000_000));
    }

    #[test]
    fn test_init_prescalers_before_source() {
        let bus = SimBus::new();
        let mut rcc = rcc(&bus);
        let config = ClockConfig {
            source: SysClockSource::HseCrystal,
            ahb: AhbPrescaler::Div2,
            apb1: ApbPrescaler::Div4,
            apb2: ApbPrescaler::Div1,
        };

        let clocks = rcc.init(&config).unwrap();
        assert_eq!(clocks.sysclk_hz, 8_000_000);
        assert_eq!(clocks.pclk1_hz, 1_000_000);
        assert_eq!(clocks.pclk2_hz, 4_000_000);

        // HPRE/PPRE written before HSEON
        let hse_on = bus
            .position(|a| a.is_write() && a.addr() == RCC_CR && a.value() & regs::CR_HSEON != 0)
            .unwrap();
        let last_prescaler = bus
            .accesses()
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_write() && a.addr() == RCC_CFGR && a.value() & 0x3 == 0)
            .map(|(i, _)| i)
            .max()
            .unwrap();
        assert!(last_prescaler < hse_on);

        // HSI stopped, crystal mode has no bypass
        let cr = bus.peek(RCC_CR);
        assert_eq!(cr & regs::CR_HSION, 0);
        assert_eq!(cr & regs::CR_HSEBYP, 0);
        assert_eq!(rcc.clock_source(), Ok(SysClockSource::HseCrystal));
    }

    #[test]
    fn test_hse_bypass_sets_hsebyp() {
        let bus = SimBus::new();
        let mut rcc = rcc(&bus);
        rcc.select_source(SysClockSource::HseBypass).unwrap();
        let cr = bus.peek(RCC_CR);
        assert_ne!(cr & regs::CR_HSEON, 0);
        assert_ne!(cr & regs::CR_HSEBYP, 0);
        assert_eq!(rcc.clock_source(), Ok(SysClockSource::HseBypass));

        // Back to HSI stops HSE
        rcc.select_source(SysClockSource::Hsi).unwrap();
        assert_eq!(bus.peek(RCC_CR) & regs::CR_HSEON, 0);
        assert_eq!(rcc.clock_source(), Ok(SysClockSource::Hsi));
    }

    #[test]
    fn test_pll_rejected_without_side_effects() {
        let bus = SimBus::new();
        let mut rcc = rcc(&bus);
        let config = ClockConfig {
            source: SysClockSource::Pll,
            ahb: AhbPrescaler::Div4,
            ..Default::default()
        };
        assert_eq!(rcc.init(&config), Err(Error::Unsupported));
        assert!(bus.accesses().iter().all(|a| !a.is_write()));
    }

    #[test]
    fn test_pll_readback_is_unsupported() {
        let bus = SimBus::new();
        let rcc = rcc(&bus);
        bus.poke(RCC_CFGR, 0b10 << 2);
        assert_eq!(rcc.clock_source(), Ok(SysClockSource::Pll));
        assert_eq!(rcc.apb1_hz(), Err(Error::Unsupported));
    }

    #[test]
    fn test_gate_enable_disable() {
        let bus = SimBus::new();
        let mut rcc = rcc(&bus);
        rcc.enable(ClockGate::I2c1);
        rcc.enable(ClockGate::GpioC);
        rcc.enable(ClockGate::Usart6);
        assert_eq!(bus.peek(enable_register(Bus::Apb1)), 1 << 21);
        assert_eq!(bus.peek(enable_register(Bus::Ahb1)), 1 << 2);
        assert_eq!(bus.peek(enable_register(Bus::Apb2)), 1 << 5);
        assert!(rcc.is_enabled(ClockGate::I2c1));

        rcc.disable(ClockGate::I2c1);
        assert!(!rcc.is_enabled(ClockGate::I2c1));
    }

    #[test]
    fn test_reset_pulses_bit() {
        let bus = SimBus::new();
        let mut rcc = rcc(&bus);
        rcc.reset(ClockGate::Spi1);
        let writes = bus.writes_to(reset_register(Bus::Apb2));
        assert_eq!(writes.as_slice(), &[1 << 12, 0]);
    }

    #[test]
    fn test_raw_index_validation() {
        let bus = SimBus::new();
        let mut rcc = rcc(&bus);
        assert_eq!(ClockGate::from_bus_bit(Bus::Apb1, 17), Ok(ClockGate::Usart2));
        assert_eq!(rcc.enable_raw(Bus::Apb1, 2), Err(Error::InvalidArgument));
        assert_eq!(rcc.reset_raw(Bus::Ahb1, 31), Err(Error::InvalidArgument));
        assert_eq!(bus.writes_to(enable_register(Bus::Apb1)).len(), 0);
        assert_eq!(rcc.enable_raw(Bus::Ahb1, 0), Ok(()));
        assert!(rcc.is_enabled(ClockGate::GpioA));
    }

    #[test]
    fn test_pclk_for_bus() {
        let bus = SimBus::new();
        let mut rcc = rcc(&bus);
        let config = ClockConfig {
            apb1: ApbPrescaler::Div2,
            ..Default::default()
        };
        rcc.init(&config).unwrap();
        assert_eq!(rcc.pclk_for(Bus::Apb1), Ok(8_000_000));
        assert_eq!(rcc.pclk_for(Bus::Apb2), Ok(16_000_000));
    }
}
