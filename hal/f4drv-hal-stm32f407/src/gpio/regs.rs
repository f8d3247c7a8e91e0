//! GPIO register block

use crate::ral::{Block, RegisterIo};

use super::GpioPort;

const MODER: usize = 0x00;
const OTYPER: usize = 0x04;
const OSPEEDR: usize = 0x08;
const PUPDR: usize = 0x0C;
const IDR: usize = 0x10;
const ODR: usize = 0x14;
const BSRR: usize = 0x18;
const LCKR: usize = 0x1C;
const AFRL: usize = 0x20;
const AFRH: usize = 0x24;

/// Lock key bit in LCKR
const LCKR_LCKK: u32 = 1 << 16;

/// Registers of one GPIO port
#[derive(Clone, Copy)]
pub struct GpioRegs<IO> {
    block: Block<IO>,
    port: GpioPort,
}

impl<IO: RegisterIo> GpioRegs<IO> {
    /// Create a new handle for `port` on `io`
    pub fn new(io: IO, port: GpioPort) -> Self {
        Self {
            block: Block::new(io, port.base()),
            port,
        }
    }

    pub fn port(&self) -> GpioPort {
        self.port
    }

    pub fn set_mode(&self, pin: u8, bits: u32) {
        self.block.write_field(MODER, pin as u32 * 2, 2, bits);
    }

    pub fn mode(&self, pin: u8) -> u32 {
        self.block.read_field(MODER, pin as u32 * 2, 2)
    }

    pub fn set_output_type(&self, pin: u8, open_drain: bool) {
        self.block.write_field(OTYPER, pin as u32, 1, open_drain as u32);
    }

    pub fn set_speed(&self, pin: u8, bits: u32) {
        self.block.write_field(OSPEEDR, pin as u32 * 2, 2, bits);
    }

    pub fn set_pull(&self, pin: u8, bits: u32) {
        self.block.write_field(PUPDR, pin as u32 * 2, 2, bits);
    }

    /// Alternate function selector (AFRL for pins 0-7, AFRH for 8-15)
    pub fn set_alternate(&self, pin: u8, af: u8) {
        let (offset, lane) = if pin < 8 { (AFRL, pin) } else { (AFRH, pin - 8) };
        self.block.write_field(offset, lane as u32 * 4, 4, af as u32);
    }

    pub fn input(&self) -> u32 {
        self.block.read(IDR) & 0xFFFF
    }

    pub fn output(&self) -> u32 {
        self.block.read(ODR) & 0xFFFF
    }

    pub fn write_output(&self, value: u16) {
        self.block.write(ODR, value as u32);
    }

    /// Atomic set/reset: one write, no read
    pub fn set_reset(&self, set: u16, reset: u16) {
        self.block.write(BSRR, ((reset as u32) << 16) | set as u32);
    }

    /// Run the LCKR key sequence for `mask`
    pub fn lock(&self, mask: u16) {
        let mask = mask as u32;
        self.block.write(LCKR, LCKR_LCKK | mask);
        self.block.write(LCKR, mask);
        self.block.write(LCKR, LCKR_LCKK | mask);
        let _ = self.block.read(LCKR);
    }
}
