//! Register Access Layer
//!
//! Everything above this module reaches hardware through [`RegisterIo`]:
//! a 32-bit read/write interface addressed by absolute address. The target
//! implementation is [`Mmio`] (volatile accesses); host tests use
//! [`sim::SimBus`], which records every access.
//!
//! [`Block`] pins an implementation to one peripheral's base address, and
//! the per-peripheral register types in the driver modules wrap a `Block`
//! with field-level accessors.

mod mmio;
#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use mmio::Mmio;

/// 32-bit register bus
pub trait RegisterIo {
    /// Read the register at `addr`
    fn read(&self, addr: usize) -> u32;

    /// Write `value` to the register at `addr`
    fn write(&self, addr: usize, value: u32);

    /// Read-modify-write
    fn modify<F: FnOnce(u32) -> u32>(&self, addr: usize, f: F) {
        let value = self.read(addr);
        self.write(addr, f(value));
    }

    /// Set every bit in `mask`
    fn set_bits(&self, addr: usize, mask: u32) {
        self.modify(addr, |v| v | mask);
    }

    /// Clear every bit in `mask`
    fn clear_bits(&self, addr: usize, mask: u32) {
        self.modify(addr, |v| v & !mask);
    }

    /// Check if any bit in `mask` is set
    fn any_set(&self, addr: usize, mask: u32) -> bool {
        self.read(addr) & mask != 0
    }

    /// Extract a `width`-bit field starting at `shift`
    fn read_field(&self, addr: usize, shift: u32, width: u32) -> u32 {
        (self.read(addr) >> shift) & field_mask(width)
    }

    /// Replace a `width`-bit field starting at `shift`, leaving the rest
    fn write_field(&self, addr: usize, shift: u32, width: u32, value: u32) {
        let mask = field_mask(width) << shift;
        self.modify(addr, |v| (v & !mask) | ((value << shift) & mask));
    }
}

impl<T: RegisterIo + ?Sized> RegisterIo for &T {
    fn read(&self, addr: usize) -> u32 {
        (**self).read(addr)
    }

    fn write(&self, addr: usize, value: u32) {
        (**self).write(addr, value)
    }
}

/// Mask of the low `width` bits
pub const fn field_mask(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1 << width) - 1
    }
}

/// One register block: a bus plus a base address
#[derive(Debug, Clone, Copy)]
pub struct Block<IO> {
    io: IO,
    base: usize,
}

impl<IO: RegisterIo> Block<IO> {
    /// Create a new block at `base`
    pub const fn new(io: IO, base: usize) -> Self {
        Self { io, base }
    }

    /// Base address
    pub fn base(&self) -> usize {
        self.base
    }

    /// Underlying bus
    pub fn io(&self) -> &IO {
        &self.io
    }

    pub fn read(&self, offset: usize) -> u32 {
        self.io.read(self.base + offset)
    }

    pub fn write(&self, offset: usize, value: u32) {
        self.io.write(self.base + offset, value)
    }

    pub fn modify<F: FnOnce(u32) -> u32>(&self, offset: usize, f: F) {
        self.io.modify(self.base + offset, f)
    }

    pub fn set(&self, offset: usize, mask: u32) {
        self.io.set_bits(self.base + offset, mask)
    }

    pub fn clear(&self, offset: usize, mask: u32) {
        self.io.clear_bits(self.base + offset, mask)
    }

    pub fn is_set(&self, offset: usize, mask: u32) -> bool {
        self.io.any_set(self.base + offset, mask)
    }

    /// Check if every bit in `mask` is set
    pub fn all_set(&self, offset: usize, mask: u32) -> bool {
        self.read(offset) & mask == mask
    }

    pub fn read_field(&self, offset: usize, shift: u32, width: u32) -> u32 {
        self.io.read_field(self.base + offset, shift, width)
    }

    pub fn write_field(&self, offset: usize, shift: u32, width: u32, value: u32) {
        self.io.write_field(self.base + offset, shift, width, value)
    }

    /// Busy-wait until every bit in `mask` reads set
    ///
    /// There is no timeout: a flag that never rises hangs the caller.
    pub fn wait_set(&self, offset: usize, mask: u32) {
        while !self.all_set(offset, mask) {
            core::hint::spin_loop();
        }
    }

    /// Busy-wait until every bit in `mask` reads clear
    ///
    /// There is no timeout: a flag that never falls hangs the caller.
    pub fn wait_clear(&self, offset: usize, mask: u32) {
        while self.is_set(offset, mask) {
            core::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::sim::{Access, SimBus};
    use super::*;

    #[test]
    fn test_field_mask() {
        assert_eq!(field_mask(1), 0x1);
        assert_eq!(field_mask(4), 0xF);
        assert_eq!(field_mask(32), u32::MAX);
    }

    #[test]
    fn test_write_field_preserves_neighbours() {
        let bus = SimBus::new();
        bus.poke(0x100, 0xFFFF_FFFF);
        bus.write_field(0x100, 4, 4, 0x3);
        assert_eq!(bus.peek(0x100), 0xFFFF_FF3F);
        assert_eq!(bus.read_field(0x100, 4, 4), 0x3);
    }

    #[test]
    fn test_block_offsets() {
        let bus = SimBus::new();
        let block = Block::new(&bus, 0x4000_0000);
        block.write(0x10, 0xAB);
        block.set(0x10, 0x100);
        assert_eq!(bus.peek(0x4000_0010), 0x1AB);
        assert!(block.is_set(0x10, 0x100));
        block.clear(0x10, 0x1);
        assert_eq!(bus.peek(0x4000_0010), 0x1AA);
        assert_eq!(
            bus.accesses().first(),
            Some(&Access::Write {
                addr: 0x4000_0010,
                value: 0xAB
            })
        );
    }
}
