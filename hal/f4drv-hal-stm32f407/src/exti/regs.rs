//! EXTI and SYSCFG register blocks

use crate::ral::{Block, RegisterIo};

/// EXTI base address
pub const EXTI_BASE: usize = 0x4001_3C00;
/// SYSCFG base address
pub const SYSCFG_BASE: usize = 0x4001_3800;

const IMR: usize = 0x00;
const EMR: usize = 0x04;
const RTSR: usize = 0x08;
const FTSR: usize = 0x0C;
const SWIER: usize = 0x10;
const PR: usize = 0x14;

const EXTICR1: usize = 0x08;

/// EXTI registers
pub struct ExtiRegs<IO> {
    block: Block<IO>,
}

impl<IO: RegisterIo> ExtiRegs<IO> {
    /// Create a new handle on `io`
    pub fn new(io: IO) -> Self {
        Self {
            block: Block::new(io, EXTI_BASE),
        }
    }

    pub fn set_interrupt_mask(&self, line: u8, unmasked: bool) {
        if unmasked {
            self.block.set(IMR, 1 << line);
        } else {
            self.block.clear(IMR, 1 << line);
        }
    }

    pub fn is_unmasked(&self, line: u8) -> bool {
        self.block.is_set(IMR, 1 << line)
    }

    pub fn set_event_mask(&self, line: u8, unmasked: bool) {
        if unmasked {
            self.block.set(EMR, 1 << line);
        } else {
            self.block.clear(EMR, 1 << line);
        }
    }

    pub fn set_rising(&self, line: u8, on: bool) {
        if on {
            self.block.set(RTSR, 1 << line);
        } else {
            self.block.clear(RTSR, 1 << line);
        }
    }

    pub fn set_falling(&self, line: u8, on: bool) {
        if on {
            self.block.set(FTSR, 1 << line);
        } else {
            self.block.clear(FTSR, 1 << line);
        }
    }

    pub fn is_pending(&self, line: u8) -> bool {
        self.block.is_set(PR, 1 << line)
    }

    /// Pending lines as a bit set
    pub fn pending(&self) -> u32 {
        self.block.read(PR)
    }

    /// Write-1-to-clear of exactly this line's pending bit
    pub fn clear_pending(&self, line: u8) {
        self.block.write(PR, 1 << line);
    }

    /// Raise the line from software (SWIER)
    pub fn trigger(&self, line: u8) {
        self.block.set(SWIER, 1 << line);
    }
}

/// SYSCFG registers (EXTI port multiplexer)
pub struct SyscfgRegs<IO> {
    block: Block<IO>,
}

impl<IO: RegisterIo> SyscfgRegs<IO> {
    /// Create a new handle on `io`
    pub fn new(io: IO) -> Self {
        Self {
            block: Block::new(io, SYSCFG_BASE),
        }
    }

    /// Select the port driving `line`; only that line's 4-bit field changes
    pub fn set_exti_source(&self, line: u8, port_code: u8) {
        let offset = EXTICR1 + (line as usize / 4) * 4;
        let shift = (line as u32 % 4) * 4;
        self.block.write_field(offset, shift, 4, port_code as u32);
    }

    pub fn exti_source(&self, line: u8) -> u8 {
        let offset = EXTICR1 + (line as usize / 4) * 4;
        let shift = (line as u32 % 4) * 4;
        self.block.read_field(offset, shift, 4) as u8
    }
}
