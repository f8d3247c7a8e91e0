//! Simulated register bus
//!
//! A register file in RAM that records every access in order. Tests model
//! the hardware side with hooks: plain functions run after each access that
//! may update registers (raise TXE after a DR write, clear ADDR after the
//! SR1/SR2 read pair, ...). Scripted values can be queued for successive
//! reads of one address, which is how received data is fed to a driver.

use core::cell::RefCell;

use heapless::{LinearMap, Vec};

use super::RegisterIo;

/// Registers a single bus can hold
pub const MAX_REGISTERS: usize = 64;
/// Accesses kept in the log; later ones are counted but dropped
pub const LOG_CAPACITY: usize = 2048;
/// Hooks per bus
pub const MAX_HOOKS: usize = 8;
/// Queued read values per bus
pub const MAX_QUEUED: usize = 64;

/// One recorded bus access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read { addr: usize, value: u32 },
    Write { addr: usize, value: u32 },
}

impl Access {
    pub fn addr(&self) -> usize {
        match self {
            Access::Read { addr, .. } | Access::Write { addr, .. } => *addr,
        }
    }

    pub fn value(&self) -> u32 {
        match self {
            Access::Read { value, .. } | Access::Write { value, .. } => *value,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Access::Write { .. })
    }
}

/// Register file as seen by hooks
#[derive(Debug, Default)]
pub struct SimRegs {
    values: LinearMap<usize, u32, MAX_REGISTERS>,
}

impl SimRegs {
    /// Current value (registers never written read as zero)
    pub fn get(&self, addr: usize) -> u32 {
        self.values.get(&addr).copied().unwrap_or(0)
    }

    /// Overwrite a register
    ///
    /// # Panics
    /// When more than [`MAX_REGISTERS`] distinct addresses are used.
    pub fn set(&mut self, addr: usize, value: u32) {
        if self.values.insert(addr, value).is_err() {
            panic!("simulated bus register file full");
        }
    }

    pub fn set_bits(&mut self, addr: usize, mask: u32) {
        let value = self.get(addr) | mask;
        self.set(addr, value);
    }

    pub fn clear_bits(&mut self, addr: usize, mask: u32) {
        let value = self.get(addr) & !mask;
        self.set(addr, value);
    }
}

/// Hardware model run after every access
pub type Hook = fn(&mut SimRegs, &Access);

#[derive(Default)]
struct State {
    regs: SimRegs,
    log: Vec<Access, LOG_CAPACITY>,
    dropped: usize,
    hooks: Vec<Hook, MAX_HOOKS>,
    queued: Vec<(usize, u32), MAX_QUEUED>,
}

/// Simulated register bus
#[derive(Default)]
pub struct SimBus {
    state: RefCell<State>,
}

impl SimBus {
    /// Create a new bus with every register zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a hardware model hook
    pub fn hook(&self, hook: Hook) {
        if self.state.borrow_mut().hooks.push(hook).is_err() {
            panic!("simulated bus hook table full");
        }
    }

    /// Queue `value` to be returned by the next unserved read of `addr`
    ///
    /// Queued values take precedence over the register file and are
    /// consumed in order.
    pub fn queue_read(&self, addr: usize, value: u32) {
        if self.state.borrow_mut().queued.push((addr, value)).is_err() {
            panic!("simulated bus read queue full");
        }
    }

    /// Number of queued values not yet read
    pub fn queued(&self) -> usize {
        self.state.borrow().queued.len()
    }

    /// Read a register without logging or running hooks
    pub fn peek(&self, addr: usize) -> u32 {
        self.state.borrow().regs.get(addr)
    }

    /// Write a register without logging or running hooks
    pub fn poke(&self, addr: usize, value: u32) {
        self.state.borrow_mut().regs.set(addr, value);
    }

    /// Copy of the access log
    pub fn accesses(&self) -> Vec<Access, LOG_CAPACITY> {
        self.state.borrow().log.clone()
    }

    /// Values written to `addr`, in order
    pub fn writes_to(&self, addr: usize) -> Vec<u32, LOG_CAPACITY> {
        self.state
            .borrow()
            .log
            .iter()
            .filter(|a| a.is_write() && a.addr() == addr)
            .map(|a| a.value())
            .collect()
    }

    /// Number of reads of `addr`
    pub fn reads_of(&self, addr: usize) -> usize {
        self.state
            .borrow()
            .log
            .iter()
            .filter(|a| !a.is_write() && a.addr() == addr)
            .count()
    }

    /// Position in the log of the first access matching `pred`
    pub fn position<P: Fn(&Access) -> bool>(&self, pred: P) -> Option<usize> {
        self.state.borrow().log.iter().position(pred)
    }

    /// Forget all recorded accesses
    pub fn clear_log(&self) {
        let mut state = self.state.borrow_mut();
        state.log.clear();
        state.dropped = 0;
    }

    /// Accesses that did not fit in the log
    pub fn dropped(&self) -> usize {
        self.state.borrow().dropped
    }

    fn record(state: &mut State, access: Access) {
        if state.log.push(access).is_err() {
            state.dropped += 1;
        }
        let hooks = state.hooks.clone();
        for hook in hooks.iter() {
            hook(&mut state.regs, &access);
        }
    }
}

impl RegisterIo for SimBus {
    fn read(&self, addr: usize) -> u32 {
        let mut state = self.state.borrow_mut();
        let value = match state.queued.iter().position(|(a, _)| *a == addr) {
            Some(i) => state.queued.remove(i).1,
            None => state.regs.get(addr),
        };
        Self::record(&mut state, Access::Read { addr, value });
        value
    }

    fn write(&self, addr: usize, value: u32) {
        let mut state = self.state.borrow_mut();
        state.regs.set(addr, value);
        Self::record(&mut state, Access::Write { addr, value });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: usize = 0x100;
    const DR: usize = 0x104;

    fn dr_write_sets_flag(regs: &mut SimRegs, access: &Access) {
        if let Access::Write { addr: DR, .. } = access {
            regs.set_bits(SR, 0x80);
        }
    }

    #[test]
    fn test_log_order() {
        let bus = SimBus::new();
        bus.write(SR, 1);
        let _ = bus.read(SR);
        bus.write(DR, 2);

        let log = bus.accesses();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0], Access::Write { addr: SR, value: 1 });
        assert_eq!(log[1], Access::Read { addr: SR, value: 1 });
        assert_eq!(bus.writes_to(DR).as_slice(), &[2]);
        assert_eq!(bus.reads_of(SR), 1);
    }

    #[test]
    fn test_hook_models_hardware() {
        let bus = SimBus::new();
        bus.hook(dr_write_sets_flag);
        assert_eq!(bus.peek(SR), 0);
        bus.write(DR, 0x55);
        assert_eq!(bus.peek(SR), 0x80);
    }

    #[test]
    fn test_queued_reads_in_order() {
        let bus = SimBus::new();
        bus.poke(DR, 0xEE);
        bus.queue_read(DR, 1);
        bus.queue_read(DR, 2);
        assert_eq!(bus.read(DR), 1);
        assert_eq!(bus.read(DR), 2);
        assert_eq!(bus.read(DR), 0xEE);
        assert_eq!(bus.queued(), 0);
    }
}
