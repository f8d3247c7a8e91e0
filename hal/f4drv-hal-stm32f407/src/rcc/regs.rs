//! RCC register block

use f4drv_core::clock::{AhbPrescaler, ApbPrescaler, Bus};

use crate::ral::{Block, RegisterIo};

/// RCC base address
pub const RCC_BASE: usize = 0x4002_3800;

// ============================================================================
// Register Offsets
// ============================================================================

const CR: usize = 0x00;
const CFGR: usize = 0x08;
const AHB1RSTR: usize = 0x10;
const AHB2RSTR: usize = 0x14;
const APB1RSTR: usize = 0x20;
const APB2RSTR: usize = 0x24;
const AHB1ENR: usize = 0x30;
const AHB2ENR: usize = 0x34;
const APB1ENR: usize = 0x40;
const APB2ENR: usize = 0x44;

// ============================================================================
// CR bits
// ============================================================================

pub const CR_HSION: u32 = 1 << 0;
pub const CR_HSIRDY: u32 = 1 << 1;
pub const CR_HSEON: u32 = 1 << 16;
pub const CR_HSERDY: u32 = 1 << 17;
pub const CR_HSEBYP: u32 = 1 << 18;

// ============================================================================
// CFGR fields
// ============================================================================

const CFGR_SW_SHIFT: u32 = 0;
const CFGR_SWS_SHIFT: u32 = 2;
const CFGR_HPRE_SHIFT: u32 = 4;
const CFGR_PPRE1_SHIFT: u32 = 10;
const CFGR_PPRE2_SHIFT: u32 = 13;

/// RCC registers
pub struct RccRegs<IO> {
    block: Block<IO>,
}

impl<IO: RegisterIo> RccRegs<IO> {
    /// Create a new handle on `io`
    pub fn new(io: IO) -> Self {
        Self {
            block: Block::new(io, RCC_BASE),
        }
    }

    // --- oscillators ---

    pub fn set_hsi(&self, on: bool) {
        if on {
            self.block.set(CR, CR_HSION);
        } else {
            self.block.clear(CR, CR_HSION);
        }
    }

    pub fn hsi_ready(&self) -> bool {
        self.block.is_set(CR, CR_HSIRDY)
    }

    pub fn set_hse(&self, on: bool) {
        if on {
            self.block.set(CR, CR_HSEON);
        } else {
            self.block.clear(CR, CR_HSEON);
        }
    }

    pub fn hse_enabled(&self) -> bool {
        self.block.is_set(CR, CR_HSEON)
    }

    pub fn hse_ready(&self) -> bool {
        self.block.is_set(CR, CR_HSERDY)
    }

    /// HSEBYP is only writable while HSE is off
    pub fn set_hse_bypass(&self, bypass: bool) {
        if bypass {
            self.block.set(CR, CR_HSEBYP);
        } else {
            self.block.clear(CR, CR_HSEBYP);
        }
    }

    pub fn hse_bypass(&self) -> bool {
        self.block.is_set(CR, CR_HSEBYP)
    }

    /// Busy-wait for HSIRDY (no timeout)
    pub fn wait_hsi_ready(&self) {
        self.block.wait_set(CR, CR_HSIRDY);
    }

    /// Busy-wait for HSERDY (no timeout)
    pub fn wait_hse_ready(&self) {
        self.block.wait_set(CR, CR_HSERDY);
    }

    /// Busy-wait for HSERDY to drop (no timeout)
    pub fn wait_hse_stopped(&self) {
        self.block.wait_clear(CR, CR_HSERDY);
    }

    // --- clock switch ---

    /// Write SW
    pub fn set_switch(&self, sw: u32) {
        self.block.write_field(CFGR, CFGR_SW_SHIFT, 2, sw);
    }

    /// Read SWS
    pub fn switch_status(&self) -> u32 {
        self.block.read_field(CFGR, CFGR_SWS_SHIFT, 2)
    }

    /// Busy-wait until SWS reports `sw` (no timeout)
    pub fn wait_switch_status(&self, sw: u32) {
        while self.switch_status() != sw {
            core::hint::spin_loop();
        }
    }

    // --- prescalers ---

    pub fn set_ahb_prescaler(&self, div: AhbPrescaler) {
        self.block.write_field(CFGR, CFGR_HPRE_SHIFT, 4, div.bits());
    }

    pub fn ahb_prescaler(&self) -> AhbPrescaler {
        AhbPrescaler::from_bits(self.block.read_field(CFGR, CFGR_HPRE_SHIFT, 4))
    }

    pub fn set_apb1_prescaler(&self, div: ApbPrescaler) {
        self.block.write_field(CFGR, CFGR_PPRE1_SHIFT, 3, div.bits());
    }

    pub fn apb1_prescaler(&self) -> ApbPrescaler {
        ApbPrescaler::from_bits(self.block.read_field(CFGR, CFGR_PPRE1_SHIFT, 3))
    }

    pub fn set_apb2_prescaler(&self, div: ApbPrescaler) {
        self.block.write_field(CFGR, CFGR_PPRE2_SHIFT, 3, div.bits());
    }

    pub fn apb2_prescaler(&self) -> ApbPrescaler {
        ApbPrescaler::from_bits(self.block.read_field(CFGR, CFGR_PPRE2_SHIFT, 3))
    }

    // --- gates ---

    pub fn set_enable(&self, bus: Bus, bit: u8, on: bool) {
        let offset = enable_offset(bus);
        if on {
            self.block.set(offset, 1 << bit);
        } else {
            self.block.clear(offset, 1 << bit);
        }
    }

    pub fn is_enabled(&self, bus: Bus, bit: u8) -> bool {
        self.block.is_set(enable_offset(bus), 1 << bit)
    }

    /// Pulse the reset bit: set, then clear
    pub fn pulse_reset(&self, bus: Bus, bit: u8) {
        let offset = reset_offset(bus);
        self.block.set(offset, 1 << bit);
        self.block.clear(offset, 1 << bit);
    }
}

/// Absolute address of a bus's enable register
pub const fn enable_register(bus: Bus) -> usize {
    RCC_BASE + enable_offset(bus)
}

/// Absolute address of a bus's reset register
pub const fn reset_register(bus: Bus) -> usize {
    RCC_BASE + reset_offset(bus)
}

const fn enable_offset(bus: Bus) -> usize {
    match bus {
        Bus::Ahb1 => AHB1ENR,
        Bus::Ahb2 => AHB2ENR,
        Bus::Apb1 => APB1ENR,
        Bus::Apb2 => APB2ENR,
    }
}

const fn reset_offset(bus: Bus) -> usize {
    match bus {
        Bus::Ahb1 => AHB1RSTR,
        Bus::Ahb2 => AHB2RSTR,
        Bus::Apb1 => APB1RSTR,
        Bus::Apb2 => APB2RSTR,
    }
}

/// Absolute address of CR
pub const RCC_CR: usize = RCC_BASE + CR;
/// Absolute address of CFGR
pub const RCC_CFGR: usize = RCC_BASE + CFGR;
