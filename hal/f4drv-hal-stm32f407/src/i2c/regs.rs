//! I2C register block

use crate::ral::{Block, RegisterIo};

use super::I2cInstance;

pub(crate) const CR1: usize = 0x00;
pub(crate) const CR2: usize = 0x04;
pub(crate) const OAR1: usize = 0x08;
pub(crate) const DR: usize = 0x10;
pub(crate) const SR1: usize = 0x14;
pub(crate) const SR2: usize = 0x18;
pub(crate) const CCR: usize = 0x1C;
pub(crate) const TRISE: usize = 0x20;

// CR1
pub const CR1_PE: u32 = 1 << 0;
pub const CR1_START: u32 = 1 << 8;
pub const CR1_STOP: u32 = 1 << 9;
pub const CR1_ACK: u32 = 1 << 10;

// CR2
pub const CR2_ITERREN: u32 = 1 << 8;
pub const CR2_ITEVTEN: u32 = 1 << 9;
pub const CR2_ITBUFEN: u32 = 1 << 10;

// OAR1: bit 14 must be kept at 1 by software
const OAR1_RESERVED: u32 = 1 << 14;

// SR1
pub const SR1_SB: u32 = 1 << 0;
pub const SR1_ADDR: u32 = 1 << 1;
pub const SR1_BTF: u32 = 1 << 2;
pub const SR1_STOPF: u32 = 1 << 4;
pub const SR1_RXNE: u32 = 1 << 6;
pub const SR1_TXE: u32 = 1 << 7;
pub const SR1_BERR: u32 = 1 << 8;
pub const SR1_ARLO: u32 = 1 << 9;
pub const SR1_AF: u32 = 1 << 10;
pub const SR1_OVR: u32 = 1 << 11;
pub const SR1_TIMEOUT: u32 = 1 << 14;

// SR2
pub const SR2_MSL: u32 = 1 << 0;
pub const SR2_TRA: u32 = 1 << 2;

/// Registers of one I2C unit
pub struct I2cRegs<IO> {
    block: Block<IO>,
}

impl<IO: RegisterIo> I2cRegs<IO> {
    /// Create a new handle for `instance` on `io`
    pub fn new(io: IO, instance: I2cInstance) -> Self {
        Self {
            block: Block::new(io, instance.base()),
        }
    }

    pub fn base(&self) -> usize {
        self.block.base()
    }

    pub fn set_enabled(&self, on: bool) {
        if on {
            self.block.set(CR1, CR1_PE);
        } else {
            self.block.clear(CR1, CR1_PE);
        }
    }

    /// ACK after each received byte; only sticks while PE is set
    pub fn set_ack(&self, on: bool) {
        if on {
            self.block.set(CR1, CR1_ACK);
        } else {
            self.block.clear(CR1, CR1_ACK);
        }
    }

    pub fn generate_start(&self) {
        self.block.set(CR1, CR1_START);
    }

    pub fn generate_stop(&self) {
        self.block.set(CR1, CR1_STOP);
    }

    pub fn set_freq(&self, mhz: u32) {
        self.block.write_field(CR2, 0, 6, mhz);
    }

    /// Enable or disable the interrupt sources in `mask` (CR2)
    pub fn set_interrupts(&self, mask: u32, on: bool) {
        if on {
            self.block.set(CR2, mask);
        } else {
            self.block.clear(CR2, mask);
        }
    }

    /// Check if every interrupt source in `mask` is enabled
    pub fn interrupts_enabled(&self, mask: u32) -> bool {
        self.block.all_set(CR2, mask)
    }

    /// 7-bit own address
    pub fn set_own_address(&self, address: u8) {
        self.block
            .write(OAR1, ((address as u32 & 0x7F) << 1) | OAR1_RESERVED);
    }

    /// Full CCR value (FS and DUTY included)
    pub fn set_ccr(&self, value: u32) {
        self.block.write(CCR, value);
    }

    pub fn set_trise(&self, value: u32) {
        self.block.write(TRISE, value & 0x3F);
    }

    pub fn write_data(&self, byte: u8) {
        self.block.write(DR, byte as u32);
    }

    pub fn read_data(&self) -> u8 {
        self.block.read(DR) as u8
    }

    /// Check if any SR1 flag in `mask` is set
    pub fn flag(&self, mask: u32) -> bool {
        self.block.is_set(SR1, mask)
    }

    /// Busy-wait for every SR1 flag in `mask` (no timeout)
    pub fn wait_flag(&self, mask: u32) {
        self.block.wait_set(SR1, mask);
    }

    /// Master mode (SR2.MSL); reading SR2 also clears a pending ADDR
    pub fn is_master(&self) -> bool {
        self.block.is_set(SR2, SR2_MSL)
    }

    /// Transmitter role (SR2.TRA)
    pub fn is_transmitter(&self) -> bool {
        self.block.is_set(SR2, SR2_TRA)
    }

    /// Clear ADDR: SR1 read followed by SR2 read
    pub fn clear_addr(&self) {
        let _ = self.block.read(SR1);
        let _ = self.block.read(SR2);
    }

    /// Clear STOPF: SR1 read followed by a CR1 write
    pub fn clear_stopf(&self) {
        let _ = self.block.read(SR1);
        let cr1 = self.block.read(CR1);
        self.block.write(CR1, cr1);
    }

    /// Clear one error flag; SR1 error bits are write-0-to-clear
    pub fn clear_error(&self, flag: u32) {
        self.block.write(SR1, !flag & 0xFFFF);
    }
}
