//! Interrupt controller (NVIC) and priority grouping (SCB AIRCR)
//!
//! Enable, disable and pend registers are write-1 set/clear banks, so they
//! are always written with a single-bit mask, never read-modify-written.
//! Priorities live in the 4 implemented high bits of each IPR byte.

use f4drv_core::{Error, Result};

use crate::ral::{Block, RegisterIo};

// ============================================================================
// Addresses
// ============================================================================

/// NVIC base (ISER0)
pub const NVIC_BASE: usize = 0xE000_E100;
/// SCB AIRCR
pub const SCB_AIRCR: usize = 0xE000_ED0C;

const ISER: usize = 0x000;
const ICER: usize = 0x080;
const ISPR: usize = 0x100;
const ICPR: usize = 0x180;
const IABR: usize = 0x200;
const IPR: usize = 0x300;

/// Key that must accompany every AIRCR write
const AIRCR_VECTKEY: u32 = 0x05FA << 16;
const AIRCR_PRIGROUP_SHIFT: u32 = 8;

/// Priority bits implemented by the STM32F407
pub const PRIORITY_BITS: u32 = 4;

/// Highest device interrupt number on the STM32F407
pub const MAX_IRQ: u16 = 90;

// ============================================================================
// Interrupt numbers
// ============================================================================

/// Device interrupt number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Irq(u16);

impl Irq {
    pub const EXTI0: Irq = Irq(6);
    pub const EXTI1: Irq = Irq(7);
    pub const EXTI2: Irq = Irq(8);
    pub const EXTI3: Irq = Irq(9);
    pub const EXTI4: Irq = Irq(10);
    pub const EXTI9_5: Irq = Irq(23);
    pub const I2C1_EV: Irq = Irq(31);
    pub const I2C1_ER: Irq = Irq(32);
    pub const I2C2_EV: Irq = Irq(33);
    pub const I2C2_ER: Irq = Irq(34);
    pub const SPI1: Irq = Irq(35);
    pub const SPI2: Irq = Irq(36);
    pub const USART1: Irq = Irq(37);
    pub const USART2: Irq = Irq(38);
    pub const USART3: Irq = Irq(39);
    pub const EXTI15_10: Irq = Irq(40);
    pub const SPI3: Irq = Irq(51);
    pub const UART4: Irq = Irq(52);
    pub const UART5: Irq = Irq(53);
    pub const USART6: Irq = Irq(71);
    pub const I2C3_EV: Irq = Irq(72);
    pub const I2C3_ER: Irq = Irq(73);
    pub const SPI4: Irq = Irq(84);
    pub const SPI5: Irq = Irq(85);
    pub const SPI6: Irq = Irq(86);

    /// Wrap a raw interrupt number (validated when used)
    pub const fn from_number(number: u16) -> Self {
        Irq(number)
    }

    /// Raw interrupt number
    pub const fn number(&self) -> u16 {
        self.0
    }

    /// Check if the number exists on this device
    pub const fn is_valid(&self) -> bool {
        self.0 <= MAX_IRQ
    }

    fn checked(self) -> Result<usize> {
        if self.is_valid() {
            Ok(self.0 as usize)
        } else {
            warn!("nvic: irq {} out of range", self.0);
            Err(Error::InvalidArgument)
        }
    }
}

/// Split of the priority field into preemption group and sub-priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PriorityGrouping {
    /// 4 group bits, no sub-priority
    #[default]
    Group4Sub0,
    /// 3 group bits, 1 sub-priority bit
    Group3Sub1,
    /// 2 group bits, 2 sub-priority bits
    Group2Sub2,
    /// 1 group bit, 3 sub-priority bits
    Group1Sub3,
    /// No group bits, 4 sub-priority bits
    Group0Sub4,
}

impl PriorityGrouping {
    /// Number of sub-priority bits
    pub const fn sub_bits(&self) -> u32 {
        match self {
            PriorityGrouping::Group4Sub0 => 0,
            PriorityGrouping::Group3Sub1 => 1,
            PriorityGrouping::Group2Sub2 => 2,
            PriorityGrouping::Group1Sub3 => 3,
            PriorityGrouping::Group0Sub4 => 4,
        }
    }

    /// Number of preemption group bits
    pub const fn group_bits(&self) -> u32 {
        PRIORITY_BITS - self.sub_bits()
    }

    /// AIRCR.PRIGROUP encoding
    pub const fn prigroup(&self) -> u32 {
        3 + self.sub_bits()
    }

    /// Compose a hardware priority byte
    ///
    /// Rejects a group or sub-priority that does not fit its bit budget.
    pub fn encode(&self, group: u8, sub: u8) -> Result<u8> {
        let (group, sub) = (group as u32, sub as u32);
        if group >= 1 << self.group_bits() || sub >= 1 << self.sub_bits() {
            return Err(Error::InvalidArgument);
        }
        let value = (group << self.sub_bits()) | sub;
        Ok((value << (8 - PRIORITY_BITS)) as u8)
    }
}

/// Per-interrupt settings applied by [`Nvic::configure`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NvicConfig {
    /// Preemption group priority
    pub group: u8,
    /// Sub-priority
    pub sub: u8,
    /// Pend the interrupt after enabling it
    pub pending: bool,
}

// ============================================================================
// Register blocks
// ============================================================================

/// NVIC registers
pub struct NvicRegs<IO> {
    block: Block<IO>,
}

impl<IO: RegisterIo> NvicRegs<IO> {
    /// Create a new handle on `io`
    pub fn new(io: IO) -> Self {
        Self {
            block: Block::new(io, NVIC_BASE),
        }
    }

    fn bank(n: usize) -> (usize, u32) {
        ((n / 32) * 4, 1 << (n % 32))
    }

    pub fn set_enable(&self, n: usize) {
        let (word, bit) = Self::bank(n);
        self.block.write(ISER + word, bit);
    }

    pub fn clear_enable(&self, n: usize) {
        let (word, bit) = Self::bank(n);
        self.block.write(ICER + word, bit);
    }

    pub fn is_enabled(&self, n: usize) -> bool {
        let (word, bit) = Self::bank(n);
        self.block.is_set(ISER + word, bit)
    }

    pub fn set_pending(&self, n: usize) {
        let (word, bit) = Self::bank(n);
        self.block.write(ISPR + word, bit);
    }

    pub fn clear_pending(&self, n: usize) {
        let (word, bit) = Self::bank(n);
        self.block.write(ICPR + word, bit);
    }

    pub fn is_pending(&self, n: usize) -> bool {
        let (word, bit) = Self::bank(n);
        self.block.is_set(ISPR + word, bit)
    }

    pub fn is_active(&self, n: usize) -> bool {
        let (word, bit) = Self::bank(n);
        self.block.is_set(IABR + word, bit)
    }

    /// Write one IPR byte (word-wide read-modify-write of its lane)
    pub fn set_priority_byte(&self, n: usize, value: u8) {
        let offset = IPR + (n / 4) * 4;
        let shift = ((n % 4) * 8) as u32;
        self.block.write_field(offset, shift, 8, value as u32);
    }

    pub fn priority_byte(&self, n: usize) -> u8 {
        let offset = IPR + (n / 4) * 4;
        let shift = ((n % 4) * 8) as u32;
        self.block.read_field(offset, shift, 8) as u8
    }
}

/// System control block registers used for priority grouping
pub struct ScbRegs<IO> {
    io: IO,
}

impl<IO: RegisterIo> ScbRegs<IO> {
    /// Create a new handle on `io`
    pub fn new(io: IO) -> Self {
        Self { io }
    }

    /// Write PRIGROUP together with the AIRCR key
    pub fn set_prigroup(&self, prigroup: u32) {
        self.io
            .write(SCB_AIRCR, AIRCR_VECTKEY | (prigroup << AIRCR_PRIGROUP_SHIFT));
    }

    pub fn prigroup(&self) -> u32 {
        self.io.read_field(SCB_AIRCR, AIRCR_PRIGROUP_SHIFT, 3)
    }
}

// ============================================================================
// NVIC Driver
// ============================================================================

/// Interrupt controller driver
///
/// Remembers the active grouping so priorities can be given as
/// (group, sub) pairs.
pub struct Nvic<IO> {
    nvic: NvicRegs<IO>,
    scb: ScbRegs<IO>,
    grouping: PriorityGrouping,
}

impl<IO: RegisterIo> Nvic<IO> {
    /// Create a new driver assuming the reset grouping
    pub fn new(nvic: NvicRegs<IO>, scb: ScbRegs<IO>) -> Self {
        Self {
            nvic,
            scb,
            grouping: PriorityGrouping::default(),
        }
    }

    /// Program the priority grouping split
    pub fn set_grouping(&mut self, grouping: PriorityGrouping) {
        self.scb.set_prigroup(grouping.prigroup());
        self.grouping = grouping;
    }

    /// Active grouping
    pub fn grouping(&self) -> PriorityGrouping {
        self.grouping
    }

    pub fn enable(&mut self, irq: Irq) -> Result<()> {
        let n = irq.checked()?;
        self.nvic.set_enable(n);
        Ok(())
    }

    pub fn disable(&mut self, irq: Irq) -> Result<()> {
        let n = irq.checked()?;
        self.nvic.clear_enable(n);
        Ok(())
    }

    pub fn is_enabled(&self, irq: Irq) -> Result<bool> {
        Ok(self.nvic.is_enabled(irq.checked()?))
    }

    pub fn set_pending(&mut self, irq: Irq) -> Result<()> {
        let n = irq.checked()?;
        self.nvic.set_pending(n);
        Ok(())
    }

    pub fn clear_pending(&mut self, irq: Irq) -> Result<()> {
        let n = irq.checked()?;
        self.nvic.clear_pending(n);
        Ok(())
    }

    pub fn is_pending(&self, irq: Irq) -> Result<bool> {
        Ok(self.nvic.is_pending(irq.checked()?))
    }

    pub fn is_active(&self, irq: Irq) -> Result<bool> {
        Ok(self.nvic.is_active(irq.checked()?))
    }

    /// Set an interrupt's priority from a (group, sub) pair
    pub fn set_priority(&mut self, irq: Irq, group: u8, sub: u8) -> Result<()> {
        let n = irq.checked()?;
        let byte = self.grouping.encode(group, sub)?;
        self.nvic.set_priority_byte(n, byte);
        Ok(())
    }

    /// Raw priority byte of an interrupt
    pub fn priority(&self, irq: Irq) -> Result<u8> {
        Ok(self.nvic.priority_byte(irq.checked()?))
    }

    /// Apply priority, enable, and optionally pend
    pub fn configure(&mut self, irq: Irq, config: &NvicConfig) -> Result<()> {
        self.set_priority(irq, config.group, config.sub)?;
        self.enable(irq)?;
        if config.pending {
            self.set_pending(irq)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ral::sim::SimBus;

    fn nvic(bus: &SimBus) -> Nvic<&SimBus> {
        Nvic::new(NvicRegs::new(bus), ScbRegs::new(bus))
    }

    #[test]
    fn test_grouping_writes_key() {
        let bus = SimBus::new();
        let mut nvic = nvic(&bus);
        let expected = [
            (PriorityGrouping::Group4Sub0, 0x05FA_0300),
            (PriorityGrouping::Group3Sub1, 0x05FA_0400),
            (PriorityGrouping::Group2Sub2, 0x05FA_0500),
            (PriorityGrouping::Group1Sub3, 0x05FA_0600),
            (PriorityGrouping::Group0Sub4, 0x05FA_0700),
        ];
        for (grouping, aircr) in expected {
            nvic.set_grouping(grouping);
            assert_eq!(bus.peek(SCB_AIRCR), aircr);
        }
    }

    #[test]
    fn test_enable_writes_single_bit() {
        let bus = SimBus::new();
        let mut nvic = nvic(&bus);
        nvic.enable(Irq::USART2).unwrap();
        nvic.enable(Irq::I2C3_EV).unwrap();
        assert_eq!(bus.writes_to(NVIC_BASE + 4).as_slice(), &[1 << (38 - 32)]);
        assert_eq!(bus.writes_to(NVIC_BASE + 8).as_slice(), &[1 << (72 - 64)]);
        // No read-modify-write on the set/clear banks
        assert_eq!(bus.reads_of(NVIC_BASE + 4), 0);

        nvic.disable(Irq::EXTI0).unwrap();
        assert_eq!(bus.writes_to(NVIC_BASE + ICER).as_slice(), &[1 << 6]);
    }

    #[test]
    fn test_out_of_range_has_no_effect() {
        let bus = SimBus::new();
        let mut nvic = nvic(&bus);
        let bogus = Irq::from_number(91);
        assert_eq!(nvic.enable(bogus), Err(Error::InvalidArgument));
        assert_eq!(nvic.disable(bogus), Err(Error::InvalidArgument));
        assert_eq!(nvic.set_priority(bogus, 1, 0), Err(Error::InvalidArgument));
        assert_eq!(nvic.is_pending(bogus), Err(Error::InvalidArgument));
        assert!(bus.accesses().is_empty());
    }

    #[test]
    fn test_priority_encoding() {
        let bus = SimBus::new();
        let mut nvic = nvic(&bus);
        nvic.set_grouping(PriorityGrouping::Group2Sub2);
        nvic.set_priority(Irq::SPI1, 2, 1).unwrap();
        // (2 << 2 | 1) << 4
        assert_eq!(nvic.priority(Irq::SPI1), Ok(0x90));

        // SPI1 is lane 3 of IPR8; other lanes untouched
        bus.poke(NVIC_BASE + IPR + 32, 0x0011_2233);
        nvic.set_priority(Irq::SPI1, 0, 3).unwrap();
        assert_eq!(bus.peek(NVIC_BASE + IPR + 32), 0x3011_2233);
    }

    #[test]
    fn test_priority_must_fit_grouping() {
        let bus = SimBus::new();
        let mut nvic = nvic(&bus);
        nvic.set_grouping(PriorityGrouping::Group3Sub1);
        assert_eq!(nvic.set_priority(Irq::EXTI0, 8, 0), Err(Error::InvalidArgument));
        assert_eq!(nvic.set_priority(Irq::EXTI0, 0, 2), Err(Error::InvalidArgument));
        assert_eq!(nvic.set_priority(Irq::EXTI0, 7, 1), Ok(()));
        assert_eq!(nvic.priority(Irq::EXTI0), Ok(0xF0));
    }

    #[test]
    fn test_configure_with_pending() {
        let bus = SimBus::new();
        let mut nvic = nvic(&bus);
        let config = NvicConfig {
            group: 1,
            sub: 0,
            pending: true,
        };
        nvic.configure(Irq::EXTI15_10, &config).unwrap();
        assert_eq!(nvic.is_enabled(Irq::EXTI15_10), Ok(true));
        assert_eq!(nvic.is_pending(Irq::EXTI15_10), Ok(true));
        assert_eq!(nvic.priority(Irq::EXTI15_10), Ok(0x10));
    }
}
