//! External interrupt lines and dispatch
//!
//! [`Exti`] programs edge sensitivity, port routing and masking for the 16
//! GPIO lines. [`ExtiRegistry`] owns one callback slot per line and does the
//! work of the EXTI vectors: for each pending line of a vector's group it
//! runs the slot and clears that line's pending bit exactly once, whether or
//! not anything is registered. A pending bit left set would re-enter the
//! vector forever.

mod regs;

pub use regs::{ExtiRegs, SyscfgRegs, EXTI_BASE, SYSCFG_BASE};

use f4drv_core::{Callback, Error, Result};

use crate::gpio::GpioPort;
use crate::nvic::Irq;
use crate::ral::RegisterIo;

/// GPIO-driven EXTI lines
pub const EXTI_LINES: usize = 16;

/// Trigger edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    Falling,
    Rising,
    Both,
}

fn check_line(line: u8) -> Result<()> {
    if (line as usize) < EXTI_LINES {
        Ok(())
    } else {
        Err(Error::InvalidArgument)
    }
}

// ============================================================================
// EXTI Driver
// ============================================================================

/// EXTI line configuration
pub struct Exti<IO> {
    exti: ExtiRegs<IO>,
    syscfg: SyscfgRegs<IO>,
}

impl<IO: RegisterIo> Exti<IO> {
    /// Create a new driver over the EXTI and SYSCFG registers
    ///
    /// The SYSCFG clock must be enabled for routing to take effect.
    pub fn new(exti: ExtiRegs<IO>, syscfg: SyscfgRegs<IO>) -> Self {
        Self { exti, syscfg }
    }

    /// Register handle
    pub fn regs(&self) -> &ExtiRegs<IO> {
        &self.exti
    }

    /// Select the trigger edge(s); the other trigger is turned off
    pub fn set_edge(&mut self, line: u8, edge: Edge) -> Result<()> {
        check_line(line)?;
        match edge {
            Edge::Falling => {
                self.exti.set_falling(line, true);
                self.exti.set_rising(line, false);
            }
            Edge::Rising => {
                self.exti.set_rising(line, true);
                self.exti.set_falling(line, false);
            }
            Edge::Both => {
                self.exti.set_rising(line, true);
                self.exti.set_falling(line, true);
            }
        }
        Ok(())
    }

    /// Route `port` to `line`
    pub fn route(&mut self, port: GpioPort, line: u8) -> Result<()> {
        check_line(line)?;
        self.syscfg.set_exti_source(line, port.index());
        Ok(())
    }

    /// Port currently routed to `line`
    pub fn routed_port(&self, line: u8) -> Result<u8> {
        check_line(line)?;
        Ok(self.syscfg.exti_source(line))
    }

    /// Unmask the line's interrupt
    pub fn unmask(&mut self, line: u8) -> Result<()> {
        check_line(line)?;
        self.exti.set_interrupt_mask(line, true);
        Ok(())
    }

    /// Mask the line's interrupt
    pub fn mask(&mut self, line: u8) -> Result<()> {
        check_line(line)?;
        self.exti.set_interrupt_mask(line, false);
        Ok(())
    }

    pub fn is_pending(&self, line: u8) -> Result<bool> {
        check_line(line)?;
        Ok(self.exti.is_pending(line))
    }

    pub fn clear_pending(&mut self, line: u8) -> Result<()> {
        check_line(line)?;
        self.exti.clear_pending(line);
        Ok(())
    }

    /// Raise the line from software
    pub fn trigger_software(&mut self, line: u8) -> Result<()> {
        check_line(line)?;
        self.exti.trigger(line);
        Ok(())
    }
}

// ============================================================================
// Vector groups
// ============================================================================

/// EXTI interrupt vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExtiGroup {
    Line0,
    Line1,
    Line2,
    Line3,
    Line4,
    Lines9To5,
    Lines15To10,
}

impl ExtiGroup {
    /// Lines served by this vector, ascending
    pub const fn lines(&self) -> core::ops::RangeInclusive<u8> {
        match self {
            ExtiGroup::Line0 => 0..=0,
            ExtiGroup::Line1 => 1..=1,
            ExtiGroup::Line2 => 2..=2,
            ExtiGroup::Line3 => 3..=3,
            ExtiGroup::Line4 => 4..=4,
            ExtiGroup::Lines9To5 => 5..=9,
            ExtiGroup::Lines15To10 => 10..=15,
        }
    }

    /// Vector serving `line`
    pub fn for_line(line: u8) -> Result<Self> {
        match line {
            0 => Ok(ExtiGroup::Line0),
            1 => Ok(ExtiGroup::Line1),
            2 => Ok(ExtiGroup::Line2),
            3 => Ok(ExtiGroup::Line3),
            4 => Ok(ExtiGroup::Line4),
            5..=9 => Ok(ExtiGroup::Lines9To5),
            10..=15 => Ok(ExtiGroup::Lines15To10),
            _ => Err(Error::InvalidArgument),
        }
    }

    /// NVIC interrupt number of this vector
    pub const fn irq(&self) -> Irq {
        match self {
            ExtiGroup::Line0 => Irq::EXTI0,
            ExtiGroup::Line1 => Irq::EXTI1,
            ExtiGroup::Line2 => Irq::EXTI2,
            ExtiGroup::Line3 => Irq::EXTI3,
            ExtiGroup::Line4 => Irq::EXTI4,
            ExtiGroup::Lines9To5 => Irq::EXTI9_5,
            ExtiGroup::Lines15To10 => Irq::EXTI15_10,
        }
    }
}

// ============================================================================
// Callback registry
// ============================================================================

/// Per-line callback slots
///
/// Every slot starts as a no-op. Registering replaces whatever the slot
/// held; there is one subscriber per line.
pub struct ExtiRegistry<'a> {
    slots: [Callback<'a>; EXTI_LINES],
}

impl Default for ExtiRegistry<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ExtiRegistry<'a> {
    const EMPTY: Callback<'a> = Callback::Noop;

    /// Create a new registry with every slot empty
    pub const fn new() -> Self {
        Self {
            slots: [Self::EMPTY; EXTI_LINES],
        }
    }

    /// Install `callback` for `line`, replacing any previous one
    pub fn register(&mut self, line: u8, callback: Callback<'a>) -> Result<()> {
        check_line(line)?;
        self.slots[line as usize] = callback;
        Ok(())
    }

    /// Empty a line's slot
    pub fn unregister(&mut self, line: u8) -> Result<()> {
        self.register(line, Callback::Noop)
    }

    /// Check if `line` has a callback (out-of-range lines never do)
    pub fn is_registered(&self, line: u8) -> bool {
        self.slots
            .get(line as usize)
            .is_some_and(|slot| slot.is_registered())
    }

    /// Service one EXTI vector
    ///
    /// Walks the group's lines in ascending order; for every pending line
    /// runs its slot, then clears its pending bit. Returns how many lines
    /// were serviced.
    pub fn dispatch<IO: RegisterIo>(&mut self, group: ExtiGroup, exti: &ExtiRegs<IO>) -> usize {
        let mut serviced = 0;
        for line in group.lines() {
            if exti.is_pending(line) {
                self.slots[line as usize].call();
                exti.clear_pending(line);
                serviced += 1;
            }
        }
        trace!("exti: {} serviced {}", group, serviced);
        serviced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ral::sim::{Access, SimBus, SimRegs};

    const PR: usize = EXTI_BASE + 0x14;
    const RTSR: usize = EXTI_BASE + 0x08;
    const FTSR: usize = EXTI_BASE + 0x0C;
    const SWIER: usize = EXTI_BASE + 0x10;

    /// PR is write-1-to-clear; SWIER raises PR
    fn exti_model(regs: &mut SimRegs, access: &Access) {
        if let Access::Write { addr, value } = *access {
            if addr == PR {
                // The bus stored the written value; restore the latch minus cleared bits
                let before = regs.get(PR + 0x1000);
                regs.set(PR, before & !value);
                regs.set(PR + 0x1000, before & !value);
            } else if addr == SWIER {
                let latched = regs.get(PR + 0x1000) | value;
                regs.set(PR, latched);
                regs.set(PR + 0x1000, latched);
                regs.set(SWIER, 0);
            }
        }
    }

    /// Latch an edge on `lines` (shadow copy lives at PR + 0x1000)
    fn fire(bus: &SimBus, lines: u32) {
        let latched = bus.peek(PR + 0x1000) | lines;
        bus.poke(PR + 0x1000, latched);
        bus.poke(PR, latched);
    }

    fn exti(bus: &SimBus) -> Exti<&SimBus> {
        bus.hook(exti_model);
        Exti::new(ExtiRegs::new(bus), SyscfgRegs::new(bus))
    }

    #[test]
    fn test_edge_selection() {
        let bus = SimBus::new();
        let mut exti = exti(&bus);

        exti.set_edge(2, Edge::Both).unwrap();
        assert_eq!(bus.peek(RTSR), 1 << 2);
        assert_eq!(bus.peek(FTSR), 1 << 2);

        exti.set_edge(2, Edge::Falling).unwrap();
        assert_eq!(bus.peek(RTSR), 0);
        assert_eq!(bus.peek(FTSR), 1 << 2);

        exti.set_edge(2, Edge::Rising).unwrap();
        assert_eq!(bus.peek(RTSR), 1 << 2);
        assert_eq!(bus.peek(FTSR), 0);
    }

    #[test]
    fn test_route_touches_only_its_field() {
        let bus = SimBus::new();
        let mut exti = exti(&bus);
        let exticr2 = SYSCFG_BASE + 0x0C;

        exti.route(GpioPort::B, 4).unwrap();
        exti.route(GpioPort::D, 6).unwrap();
        assert_eq!(bus.peek(exticr2), (3 << 8) | 1);
        assert_eq!(exti.routed_port(4), Ok(1));

        exti.route(GpioPort::A, 4).unwrap();
        assert_eq!(bus.peek(exticr2), 3 << 8);
    }

    #[test]
    fn test_out_of_range_lines() {
        let bus = SimBus::new();
        let mut exti = exti(&bus);
        let mut registry = ExtiRegistry::new();
        assert_eq!(exti.set_edge(16, Edge::Rising), Err(Error::InvalidArgument));
        assert_eq!(exti.unmask(16), Err(Error::InvalidArgument));
        assert_eq!(exti.route(GpioPort::A, 20), Err(Error::InvalidArgument));
        assert_eq!(
            registry.register(16, Callback::Noop),
            Err(Error::InvalidArgument)
        );
        assert!(!registry.is_registered(16));
        assert!(bus.accesses().is_empty());
    }

    #[test]
    fn test_dispatch_clears_unregistered_line() {
        let bus = SimBus::new();
        let exti = exti(&bus);
        let mut registry = ExtiRegistry::new();

        fire(&bus, 1 << 7);
        assert_eq!(registry.dispatch(ExtiGroup::Lines9To5, exti.regs()), 1);
        assert_eq!(bus.writes_to(PR).as_slice(), &[1 << 7]);
        assert_eq!(bus.peek(PR), 0);
    }

    #[test]
    fn test_dispatch_invokes_once_per_edge() {
        let bus = SimBus::new();
        let mut exti = exti(&bus);
        let mut hits = 0u32;
        {
            let mut on_edge = || hits += 1;
            let mut registry = ExtiRegistry::new();
            registry.register(3, Callback::Closure(&mut on_edge)).unwrap();

            exti.trigger_software(3).unwrap();
            assert_eq!(registry.dispatch(ExtiGroup::Line3, exti.regs()), 1);
            // Re-entering the vector with nothing latched does nothing
            assert_eq!(registry.dispatch(ExtiGroup::Line3, exti.regs()), 0);
        }
        assert_eq!(hits, 1);
        assert_eq!(bus.writes_to(PR).as_slice(), &[1 << 3]);
    }

    #[test]
    fn test_dispatch_stays_in_group() {
        let bus = SimBus::new();
        let exti = exti(&bus);
        let mut registry = ExtiRegistry::new();

        fire(&bus, (1 << 4) | (1 << 10) | (1 << 15));
        assert_eq!(registry.dispatch(ExtiGroup::Lines15To10, exti.regs()), 2);
        // Line 4 belongs to another vector and stays latched
        assert_eq!(bus.peek(PR), 1 << 4);
        // Each pending bit cleared individually, ascending
        assert_eq!(bus.writes_to(PR).as_slice(), &[1 << 10, 1 << 15]);
    }

    #[test]
    fn test_register_overwrites() {
        let mut registry = ExtiRegistry::new();
        fn first() {}
        fn second() {}
        registry.register(5, Callback::Fn(first)).unwrap();
        registry.register(5, Callback::Fn(second)).unwrap();
        assert!(registry.is_registered(5));
        registry.unregister(5).unwrap();
        assert!(!registry.is_registered(5));
    }

    #[test]
    fn test_group_lookup() {
        assert_eq!(ExtiGroup::for_line(7), Ok(ExtiGroup::Lines9To5));
        assert_eq!(ExtiGroup::for_line(10), Ok(ExtiGroup::Lines15To10));
        assert_eq!(ExtiGroup::Lines9To5.irq(), Irq::EXTI9_5);
        assert_eq!(ExtiGroup::for_line(16), Err(Error::InvalidArgument));
    }
}
