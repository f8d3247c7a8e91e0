//! USART register block

use crate::ral::{Block, RegisterIo};

use super::UsartInstance;

pub(crate) const SR: usize = 0x00;
pub(crate) const DR: usize = 0x04;
pub(crate) const BRR: usize = 0x08;
pub(crate) const CR1: usize = 0x0C;
pub(crate) const CR2: usize = 0x10;
pub(crate) const CR3: usize = 0x14;

// SR
pub const SR_PE: u32 = 1 << 0;
pub const SR_FE: u32 = 1 << 1;
pub const SR_NF: u32 = 1 << 2;
pub const SR_ORE: u32 = 1 << 3;
pub const SR_RXNE: u32 = 1 << 5;
pub const SR_TC: u32 = 1 << 6;
pub const SR_TXE: u32 = 1 << 7;
const SR_MASK: u32 = 0x3FF;

// CR1
pub const CR1_RE: u32 = 1 << 2;
pub const CR1_TE: u32 = 1 << 3;
pub const CR1_RXNEIE: u32 = 1 << 5;
pub const CR1_TCIE: u32 = 1 << 6;
pub const CR1_TXEIE: u32 = 1 << 7;
pub const CR1_PS: u32 = 1 << 9;
pub const CR1_PCE: u32 = 1 << 10;
pub const CR1_M: u32 = 1 << 12;
pub const CR1_UE: u32 = 1 << 13;
pub const CR1_OVER8: u32 = 1 << 15;

// CR2
pub const CR2_STOP_SHIFT: u32 = 12;

// CR3
pub const CR3_RTSE: u32 = 1 << 8;
pub const CR3_CTSE: u32 = 1 << 9;

/// Registers of one USART/UART unit
pub struct UsartRegs<IO> {
    block: Block<IO>,
}

impl<IO: RegisterIo> UsartRegs<IO> {
    /// Create a new handle for `instance` on `io`
    pub fn new(io: IO, instance: UsartInstance) -> Self {
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

    pub fn set_stop_bits(&self, bits: u32) {
        self.block.write_field(CR2, CR2_STOP_SHIFT, 2, bits);
    }

    /// RTS/CTS enables; other CR3 bits untouched
    pub fn set_flow_control(&self, rts: bool, cts: bool) {
        self.block.modify(CR3, |v| {
            let mut v = v & !(CR3_RTSE | CR3_CTSE);
            if rts {
                v |= CR3_RTSE;
            }
            if cts {
                v |= CR3_CTSE;
            }
            v
        });
    }

    pub fn set_brr(&self, value: u32) {
        self.block.write(BRR, value & 0xFFFF);
    }

    pub fn set_enabled(&self, on: bool) {
        if on {
            self.block.set(CR1, CR1_UE);
        } else {
            self.block.clear(CR1, CR1_UE);
        }
    }

    /// Enable or disable the interrupt sources in `mask` (CR1)
    pub fn set_interrupts(&self, mask: u32, on: bool) {
        if on {
            self.block.set(CR1, mask);
        } else {
            self.block.clear(CR1, mask);
        }
    }

    pub fn interrupts_enabled(&self, mask: u32) -> bool {
        self.block.all_set(CR1, mask)
    }

    pub fn status(&self) -> u32 {
        self.block.read(SR)
    }

    pub fn flag(&self, mask: u32) -> bool {
        self.block.is_set(SR, mask)
    }

    /// Busy-wait for every SR flag in `mask` (no timeout)
    pub fn wait_flag(&self, mask: u32) {
        self.block.wait_set(SR, mask);
    }

    pub fn write_data(&self, value: u16) {
        self.block.write(DR, value as u32 & 0x1FF);
    }

    pub fn read_data(&self) -> u16 {
        (self.block.read(DR) & 0x1FF) as u16
    }

    /// Clear TC; SR flags are write-0-to-clear
    pub fn clear_tc(&self) {
        self.block.write(SR, !SR_TC & SR_MASK);
    }
}
