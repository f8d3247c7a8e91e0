//! SPI register block

use crate::ral::{Block, RegisterIo};

use super::SpiInstance;

pub(crate) const CR1: usize = 0x00;
pub(crate) const CR2: usize = 0x04;
pub(crate) const SR: usize = 0x08;
pub(crate) const DR: usize = 0x0C;

// CR1
pub const CR1_CPHA: u32 = 1 << 0;
pub const CR1_CPOL: u32 = 1 << 1;
pub const CR1_MSTR: u32 = 1 << 2;
pub const CR1_BR_SHIFT: u32 = 3;
pub const CR1_SPE: u32 = 1 << 6;
pub const CR1_SSI: u32 = 1 << 8;
pub const CR1_SSM: u32 = 1 << 9;
pub const CR1_RXONLY: u32 = 1 << 10;
pub const CR1_DFF: u32 = 1 << 11;
pub const CR1_BIDIMODE: u32 = 1 << 15;

// CR2
pub const CR2_ERRIE: u32 = 1 << 5;
pub const CR2_RXNEIE: u32 = 1 << 6;
pub const CR2_TXEIE: u32 = 1 << 7;

// SR
pub const SR_RXNE: u32 = 1 << 0;
pub const SR_TXE: u32 = 1 << 1;
pub const SR_OVR: u32 = 1 << 6;
pub const SR_BSY: u32 = 1 << 7;

/// Registers of one SPI unit
pub struct SpiRegs<IO> {
    block: Block<IO>,
}

impl<IO: RegisterIo> SpiRegs<IO> {
    /// Create a new handle for `instance` on `io`
    pub fn new(io: IO, instance: SpiInstance) -> Self {
        Self {
            block: Block::new(io, instance.base()),
        }
    }

    pub fn base(&self) -> usize {
        self.block.base()
    }

    /// Replace CR1 wholesale
    pub fn write_cr1(&self, value: u32) {
        self.block.write(CR1, value);
    }

    pub fn set_enabled(&self, on: bool) {
        if on {
            self.block.set(CR1, CR1_SPE);
        } else {
            self.block.clear(CR1, CR1_SPE);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.block.is_set(CR1, CR1_SPE)
    }

    /// Enable or disable the interrupt sources in `mask` (CR2)
    pub fn set_interrupts(&self, mask: u32, on: bool) {
        if on {
            self.block.set(CR2, mask);
        } else {
            self.block.clear(CR2, mask);
        }
    }

    pub fn interrupts_enabled(&self, mask: u32) -> bool {
        self.block.all_set(CR2, mask)
    }

    /// Check if any SR flag in `mask` is set
    pub fn flag(&self, mask: u32) -> bool {
        self.block.is_set(SR, mask)
    }

    /// Busy-wait for every SR flag in `mask` (no timeout)
    pub fn wait_flag(&self, mask: u32) {
        self.block.wait_set(SR, mask);
    }

    /// Busy-wait until the bus is idle (no timeout)
    pub fn wait_idle(&self) {
        self.block.wait_clear(SR, SR_BSY);
    }

    pub fn write_data(&self, frame: u16) {
        self.block.write(DR, frame as u32);
    }

    pub fn read_data(&self) -> u16 {
        self.block.read(DR) as u16
    }

    /// Clear OVR: DR read followed by SR read
    pub fn clear_ovr(&self) {
        let _ = self.block.read(DR);
        let _ = self.block.read(SR);
    }
}
