//! Volatile memory-mapped bus

#![allow(unsafe_code)]

use super::RegisterIo;

/// Memory-mapped register bus
///
/// Zero-sized; only [`crate::Peripherals::take`] creates one, so every
/// register block built on it comes from the singleton.
#[derive(Debug, Clone, Copy)]
pub struct Mmio {
    _private: (),
}

impl Mmio {
    pub(crate) const fn new() -> Self {
        Self { _private: () }
    }
}

impl RegisterIo for Mmio {
    #[inline(always)]
    fn read(&self, addr: usize) -> u32 {
        // SAFETY: addresses come from the fixed STM32F407 / Cortex-M4 memory
        // map baked into the register block types; all are aligned 32-bit
        // device registers.
        unsafe { core::ptr::read_volatile(addr as *const u32) }
    }

    #[inline(always)]
    fn write(&self, addr: usize, value: u32) {
        // SAFETY: see `read`
        unsafe { core::ptr::write_volatile(addr as *mut u32, value) }
    }
}
