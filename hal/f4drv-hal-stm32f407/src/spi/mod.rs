//! SPI transfer engine
//!
//! Transmit and receive are tracked independently: one interrupt-driven
//! send and one interrupt-driven receive may be in flight at the same time,
//! each with its own descriptor and completion callback.
//!
//! Frames are 8 or 16 bits wide. In 16-bit mode buffers are consumed as
//! little-endian byte pairs, so their length must be even.

mod regs;

pub use regs::SpiRegs;
use regs::*;

use f4drv_core::error::require_buffer;
use f4drv_core::transfer::{RxTransfer, TxTransfer};
use f4drv_core::{Callback, Error, Result, TransferEvent, TransferState};
use f4drv_hal::{Mode, Phase, Polarity};

use crate::error::DriverError;
use crate::nvic::Irq;
use crate::ral::RegisterIo;
use crate::rcc::ClockGate;

// ============================================================================
// Instances and configuration
// ============================================================================

/// SPI unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiInstance {
    Spi1,
    Spi2,
    Spi3,
    Spi4,
    Spi5,
    Spi6,
}

impl SpiInstance {
    /// Register block base address
    pub const fn base(&self) -> usize {
        match self {
            SpiInstance::Spi1 => 0x4001_3000,
            SpiInstance::Spi2 => 0x4000_3800,
            SpiInstance::Spi3 => 0x4000_3C00,
            SpiInstance::Spi4 => 0x4001_3400,
            SpiInstance::Spi5 => 0x4001_5000,
            SpiInstance::Spi6 => 0x4001_5400,
        }
    }

    pub const fn irq(&self) -> Irq {
        match self {
            SpiInstance::Spi1 => Irq::SPI1,
            SpiInstance::Spi2 => Irq::SPI2,
            SpiInstance::Spi3 => Irq::SPI3,
            SpiInstance::Spi4 => Irq::SPI4,
            SpiInstance::Spi5 => Irq::SPI5,
            SpiInstance::Spi6 => Irq::SPI6,
        }
    }

    pub const fn clock_gate(&self) -> ClockGate {
        match self {
            SpiInstance::Spi1 => ClockGate::Spi1,
            SpiInstance::Spi2 => ClockGate::Spi2,
            SpiInstance::Spi3 => ClockGate::Spi3,
            SpiInstance::Spi4 => ClockGate::Spi4,
            SpiInstance::Spi5 => ClockGate::Spi5,
            SpiInstance::Spi6 => ClockGate::Spi6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceMode {
    #[default]
    Master,
    Slave,
}

/// Line topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusConfig {
    #[default]
    FullDuplex,
    /// Single bidirectional data line
    HalfDuplex,
    /// Simplex, receive only
    RxOnly,
}

/// Serial clock divider (fPCLK / n)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BaudDivider {
    Div2,
    Div4,
    #[default]
    Div8,
    Div16,
    Div32,
    Div64,
    Div128,
    Div256,
}

impl BaudDivider {
    /// CR1.BR encoding
    pub const fn bits(&self) -> u32 {
        match self {
            BaudDivider::Div2 => 0,
            BaudDivider::Div4 => 1,
            BaudDivider::Div8 => 2,
            BaudDivider::Div16 => 3,
            BaudDivider::Div32 => 4,
            BaudDivider::Div64 => 5,
            BaudDivider::Div128 => 6,
            BaudDivider::Div256 => 7,
        }
    }

    pub const fn divisor(&self) -> u32 {
        2 << self.bits()
    }
}

/// Data frame width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameFormat {
    #[default]
    Bits8,
    Bits16,
}

impl FrameFormat {
    /// Buffer bytes per frame
    pub const fn bytes(&self) -> usize {
        match self {
            FrameFormat::Bits8 => 1,
            FrameFormat::Bits16 => 2,
        }
    }
}

/// SPI configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiConfig {
    pub device_mode: DeviceMode,
    pub bus: BusConfig,
    pub divider: BaudDivider,
    pub frame: FrameFormat,
    pub polarity: Polarity,
    pub phase: Phase,
    /// Software slave management (NSS pin ignored)
    pub ssm: bool,
}

impl SpiConfig {
    /// Take polarity and phase from a standard SPI mode
    pub fn with_mode(mut self, mode: Mode) -> Self {
        let (polarity, phase) = mode.split();
        self.polarity = polarity;
        self.phase = phase;
        self
    }

    /// CR1 value for this configuration, SPE clear
    pub fn cr1(&self) -> u32 {
        let mut cr1 = self.divider.bits() << CR1_BR_SHIFT;
        if self.device_mode == DeviceMode::Master {
            cr1 |= CR1_MSTR;
        }
        match self.bus {
            BusConfig::FullDuplex => {}
            BusConfig::HalfDuplex => cr1 |= CR1_BIDIMODE,
            BusConfig::RxOnly => cr1 |= CR1_RXONLY,
        }
        if self.frame == FrameFormat::Bits16 {
            cr1 |= CR1_DFF;
        }
        if self.polarity == Polarity::IdleHigh {
            cr1 |= CR1_CPOL;
        }
        if self.phase == Phase::SecondEdge {
            cr1 |= CR1_CPHA;
        }
        if self.ssm {
            // Internal NSS held high, otherwise a master faults immediately
            cr1 |= CR1_SSM | CR1_SSI;
        }
        cr1
    }
}

// ============================================================================
// Engine
// ============================================================================

/// SPI engine for one unit
pub struct Spi<'a, IO> {
    regs: SpiRegs<IO>,
    config: SpiConfig,
    tx_state: TransferState,
    rx_state: TransferState,
    tx: Option<TxTransfer<'a>>,
    rx: Option<RxTransfer<'a>>,
    on_error: Callback<'a>,
}

impl<'a, IO: RegisterIo> Spi<'a, IO> {
    /// Create a new engine; call [`Spi::init`] before use
    pub fn new(regs: SpiRegs<IO>, config: SpiConfig) -> Self {
        Self {
            regs,
            config,
            tx_state: TransferState::Ready,
            rx_state: TransferState::Ready,
            tx: None,
            rx: None,
            on_error: Callback::Noop,
        }
    }

    /// Program CR1 with the peripheral disabled, then enable it
    pub fn init(&mut self) {
        self.regs.write_cr1(self.config.cr1());
        self.regs.set_enabled(true);
        debug!("spi@{=usize:#x}: {}", self.regs.base(), self.config);
    }

    pub fn enable(&mut self) {
        self.regs.set_enabled(true);
    }

    /// Disable the peripheral; wait for BSY to drop first if a frame is in flight
    pub fn disable(&mut self) {
        if self.regs.is_enabled() {
            self.regs.wait_idle();
        }
        self.regs.set_enabled(false);
    }

    pub fn is_enabled(&self) -> bool {
        self.regs.is_enabled()
    }

    /// Bus activity in progress (SR.BSY)
    pub fn is_busy(&self) -> bool {
        self.regs.flag(SR_BSY)
    }

    pub fn regs(&self) -> &SpiRegs<IO> {
        &self.regs
    }

    pub fn config(&self) -> &SpiConfig {
        &self.config
    }

    pub fn tx_state(&self) -> TransferState {
        self.tx_state
    }

    pub fn rx_state(&self) -> TransferState {
        self.rx_state
    }

    fn check_len(&self, len: usize) -> Result<()> {
        require_buffer(len)?;
        if len % self.config.frame.bytes() != 0 {
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }

    fn write_frame(&self, frame: &[u8]) {
        let value = match *frame {
            [lo, hi] => u16::from_le_bytes([lo, hi]),
            [byte] => byte as u16,
            _ => 0,
        };
        self.regs.write_data(value);
    }

    fn read_frame(&self, frame: &mut [u8]) {
        let value = self.regs.read_data();
        match frame {
            [lo, hi] => [*lo, *hi] = value.to_le_bytes(),
            [byte] => *byte = value as u8,
            _ => {}
        }
    }

    // ------------------------------------------------------------------------
    // Polled API (busy-waits without timeout)
    // ------------------------------------------------------------------------

    /// Send `data`, one frame per TXE
    ///
    /// Received frames are not read; in full duplex the receiver overruns.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        self.check_len(data.len())?;
        for frame in data.chunks(self.config.frame.bytes()) {
            self.regs.wait_flag(SR_TXE);
            self.write_frame(frame);
        }
        Ok(())
    }

    /// Fill `buf`, one frame per RXNE
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<()> {
        self.check_len(buf.len())?;
        for frame in buf.chunks_mut(self.config.frame.bytes()) {
            self.regs.wait_flag(SR_RXNE);
            self.read_frame(frame);
        }
        Ok(())
    }

    /// Full-duplex exchange
    ///
    /// Clocks `max(read.len(), write.len())` bytes. Missing write bytes are
    /// sent as zero; received bytes beyond `read` are dropped.
    pub fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<()> {
        let width = self.config.frame.bytes();
        let len = read.len().max(write.len());
        self.check_len(len)?;

        let mut out = [0u8; 2];
        let mut inp = [0u8; 2];
        for start in (0..len).step_by(width) {
            for (i, byte) in out[..width].iter_mut().enumerate() {
                *byte = write.get(start + i).copied().unwrap_or(0);
            }
            self.regs.wait_flag(SR_TXE);
            self.write_frame(&out[..width]);
            self.regs.wait_flag(SR_RXNE);
            self.read_frame(&mut inp[..width]);
            for (i, byte) in inp[..width].iter().enumerate() {
                if let Some(slot) = read.get_mut(start + i) {
                    *slot = *byte;
                }
            }
        }
        Ok(())
    }

    /// Full-duplex exchange replacing `buf` with the received bytes
    pub fn transfer_in_place(&mut self, buf: &mut [u8]) -> Result<()> {
        self.check_len(buf.len())?;
        for frame in buf.chunks_mut(self.config.frame.bytes()) {
            self.regs.wait_flag(SR_TXE);
            self.write_frame(frame);
            self.regs.wait_flag(SR_RXNE);
            self.read_frame(frame);
        }
        Ok(())
    }

    /// Wait until the last frame has left the shift register
    pub fn flush(&mut self) {
        self.regs.wait_idle();
    }

    // ------------------------------------------------------------------------
    // Interrupt-driven API
    // ------------------------------------------------------------------------

    /// Start an interrupt-driven send
    ///
    /// Rejected with `Busy` while a send is in flight; a receive in flight
    /// does not matter. `on_complete` runs from the interrupt handler once
    /// the last frame is written.
    pub fn send_it(&mut self, data: &'a [u8], on_complete: Callback<'a>) -> Result<()> {
        self.check_len(data.len())?;
        if let Err(e) = self.tx_state.begin(TransferEvent::BeginTx) {
            warn!("spi: send rejected ({})", self.tx_state);
            return Err(e);
        }
        self.tx = Some(TxTransfer::new(data, on_complete));
        trace!("spi: tx {} bytes", data.len());
        self.regs.set_interrupts(CR2_TXEIE, true);
        Ok(())
    }

    /// Start an interrupt-driven receive
    pub fn receive_it(&mut self, buf: &'a mut [u8], on_complete: Callback<'a>) -> Result<()> {
        self.check_len(buf.len())?;
        if let Err(e) = self.rx_state.begin(TransferEvent::BeginRx) {
            warn!("spi: receive rejected ({})", self.rx_state);
            return Err(e);
        }
        trace!("spi: rx {} bytes", buf.len());
        self.rx = Some(RxTransfer::new(buf, on_complete));
        self.regs.set_interrupts(CR2_RXNEIE, true);
        Ok(())
    }

    /// Install the overrun callback and enable the error interrupt
    pub fn set_error_callback(&mut self, callback: Callback<'a>) {
        self.on_error = callback;
        self.regs.set_interrupts(CR2_ERRIE, true);
    }

    /// Abandon the send in flight; its callback is dropped without running
    pub fn stop_transmission(&mut self) {
        self.regs.set_interrupts(CR2_TXEIE, false);
        self.tx_state.abort();
        self.tx = None;
    }

    /// Abandon the receive in flight; its callback is dropped without running
    pub fn stop_reception(&mut self) {
        self.regs.set_interrupts(CR2_RXNEIE, false);
        self.rx_state.abort();
        self.rx = None;
    }

    /// Interrupt vector body
    ///
    /// TXE, RXNE and OVR are each checked on every entry, each gated on its
    /// own enable bit.
    pub fn handle_interrupt(&mut self) {
        if self.regs.flag(SR_TXE) && self.regs.interrupts_enabled(CR2_TXEIE) {
            self.transmit_next();
        }
        if self.regs.flag(SR_RXNE) && self.regs.interrupts_enabled(CR2_RXNEIE) {
            self.receive_next();
        }
        if self.regs.flag(SR_OVR) && self.regs.interrupts_enabled(CR2_ERRIE) {
            self.regs.clear_ovr();
            warn!("spi: overrun");
            self.on_error.call();
        }
    }

    fn transmit_next(&mut self) {
        let width = self.config.frame.bytes();
        let Some(tx) = self.tx.as_mut() else {
            self.regs.set_interrupts(CR2_TXEIE, false);
            return;
        };

        let value = match self.config.frame {
            FrameFormat::Bits8 => tx.cursor.next_u8().map(u16::from),
            FrameFormat::Bits16 => tx.cursor.next_u16(),
        };
        if let Some(value) = value {
            self.regs.write_data(value);
        }

        if tx.remaining() < width {
            self.regs.set_interrupts(CR2_TXEIE, false);
            self.tx_state.finish();
            if let Some(done) = self.tx.take() {
                trace!("spi: tx complete");
                done.complete();
            }
        }
    }

    fn receive_next(&mut self) {
        let width = self.config.frame.bytes();
        let Some(rx) = self.rx.as_mut() else {
            self.regs.set_interrupts(CR2_RXNEIE, false);
            return;
        };

        let value = self.regs.read_data();
        match self.config.frame {
            FrameFormat::Bits8 => rx.cursor.push_u8(value as u8),
            FrameFormat::Bits16 => rx.cursor.push_u16(value),
        };

        if rx.remaining() < width {
            self.regs.set_interrupts(CR2_RXNEIE, false);
            self.rx_state.finish();
            if let Some(done) = self.rx.take() {
                trace!("spi: rx complete");
                done.complete();
            }
        }
    }
}

impl<IO: RegisterIo> f4drv_hal::SpiBus for Spi<'_, IO> {
    type Error = DriverError;

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> core::result::Result<(), Self::Error> {
        Ok(Spi::transfer(self, read, write)?)
    }

    fn write(&mut self, data: &[u8]) -> core::result::Result<(), Self::Error> {
        Ok(Spi::transfer(self, &mut [], data)?)
    }

    fn read(&mut self, buf: &mut [u8]) -> core::result::Result<(), Self::Error> {
        Ok(Spi::transfer(self, buf, &[])?)
    }
}

impl<IO> embedded_hal::spi::ErrorType for Spi<'_, IO> {
    type Error = DriverError;
}

impl<IO: RegisterIo> embedded_hal::spi::SpiBus<u8> for Spi<'_, IO> {
    fn read(&mut self, words: &mut [u8]) -> core::result::Result<(), Self::Error> {
        if words.is_empty() {
            return Ok(());
        }
        Ok(Spi::transfer(self, words, &[])?)
    }

    fn write(&mut self, words: &[u8]) -> core::result::Result<(), Self::Error> {
        if words.is_empty() {
            return Ok(());
        }
        Ok(Spi::transfer(self, &mut [], words)?)
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> core::result::Result<(), Self::Error> {
        if read.is_empty() && write.is_empty() {
            return Ok(());
        }
        Ok(Spi::transfer(self, read, write)?)
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> core::result::Result<(), Self::Error> {
        if words.is_empty() {
            return Ok(());
        }
        Ok(Spi::transfer_in_place(self, words)?)
    }

    fn flush(&mut self) -> core::result::Result<(), Self::Error> {
        Spi::flush(self);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ral::sim::{Access, SimBus, SimRegs};

    const BASE: usize = 0x4001_3000;
    const CR1_ADDR: usize = BASE + CR1;
    const CR2_ADDR: usize = BASE + CR2;
    const SR_ADDR: usize = BASE + SR;
    const DR_ADDR: usize = BASE + DR;

    /// MOSI wired to MISO: every written frame comes straight back
    fn loopback_model(regs: &mut SimRegs, access: &Access) {
        match *access {
            Access::Write { addr, .. } if addr == DR_ADDR => {
                regs.set_bits(SR_ADDR, SR_RXNE | SR_TXE);
            }
            Access::Read { addr, .. } if addr == DR_ADDR => {
                regs.clear_bits(SR_ADDR, SR_RXNE);
            }
            _ => {}
        }
    }

    fn spi<'a>(bus: &'a SimBus, config: SpiConfig) -> Spi<'a, &'a SimBus> {
        bus.poke(SR_ADDR, SR_TXE);
        let mut spi = Spi::new(SpiRegs::new(bus, SpiInstance::Spi1), config);
        spi.init();
        bus.clear_log();
        spi
    }

    fn wide() -> SpiConfig {
        SpiConfig {
            frame: FrameFormat::Bits16,
            ..SpiConfig::default()
        }
    }

    #[test]
    fn test_init_writes_cr1_then_spe() {
        let bus = SimBus::new();
        let config = SpiConfig {
            divider: BaudDivider::Div16,
            frame: FrameFormat::Bits16,
            ssm: true,
            ..SpiConfig::default()
        }
        .with_mode(Mode::Mode3);
        let mut spi = Spi::new(SpiRegs::new(&bus, SpiInstance::Spi1), config);
        spi.init();

        let expected = CR1_MSTR
            | (3 << CR1_BR_SHIFT)
            | CR1_DFF
            | CR1_CPOL
            | CR1_CPHA
            | CR1_SSM
            | CR1_SSI;
        assert_eq!(
            bus.writes_to(CR1_ADDR).as_slice(),
            &[expected, expected | CR1_SPE]
        );
        assert!(spi.is_enabled());
    }

    #[test]
    fn test_disable_waits_for_frame_in_flight() {
        let bus = SimBus::new();
        let mut spi = spi(&bus, SpiConfig::default());
        bus.queue_read(SR_ADDR, SR_TXE | SR_BSY);
        bus.queue_read(SR_ADDR, SR_TXE | SR_BSY);

        spi.disable();

        assert_eq!(bus.queued(), 0);
        assert_eq!(bus.reads_of(SR_ADDR), 3);
        let last_busy = bus
            .position(|a| *a == Access::Read { addr: SR_ADDR, value: SR_TXE })
            .unwrap();
        let spe_off = bus
            .position(|a| a.is_write() && a.addr() == CR1_ADDR)
            .unwrap();
        assert!(last_busy < spe_off);
        assert!(!spi.is_enabled());

        // Already disabled: no status polling
        bus.clear_log();
        spi.disable();
        assert_eq!(bus.reads_of(SR_ADDR), 0);
    }

    #[test]
    fn test_bus_config_bits() {
        let half = SpiConfig {
            bus: BusConfig::HalfDuplex,
            device_mode: DeviceMode::Slave,
            ..SpiConfig::default()
        };
        assert_eq!(half.cr1() & (CR1_BIDIMODE | CR1_RXONLY | CR1_MSTR), CR1_BIDIMODE);

        let rx_only = SpiConfig {
            bus: BusConfig::RxOnly,
            ..SpiConfig::default()
        };
        assert_eq!(rx_only.cr1() & (CR1_BIDIMODE | CR1_RXONLY), CR1_RXONLY);
        assert_eq!(BaudDivider::Div256.divisor(), 256);
    }

    #[test]
    fn test_polled_send_waits_for_txe() {
        let bus = SimBus::new();
        let mut spi = spi(&bus, SpiConfig::default());
        spi.send(&[0xDE, 0xAD, 0xBE]).unwrap();

        assert_eq!(bus.writes_to(DR_ADDR).as_slice(), &[0xDE, 0xAD, 0xBE]);
        // Each DR write directly follows a status read
        let log = bus.accesses();
        for (i, access) in log.iter().enumerate() {
            if access.is_write() && access.addr() == DR_ADDR {
                assert_eq!(log[i - 1], Access::Read { addr: SR_ADDR, value: SR_TXE });
            }
        }
    }

    #[test]
    fn test_polled_16bit_frames() {
        let bus = SimBus::new();
        let mut spi = spi(&bus, wide());
        spi.send(&[0x34, 0x12, 0x78, 0x56]).unwrap();
        assert_eq!(bus.writes_to(DR_ADDR).as_slice(), &[0x1234, 0x5678]);

        assert_eq!(spi.send(&[1, 2, 3]), Err(Error::InvalidArgument));
        assert_eq!(spi.send(&[]), Err(Error::MissingBuffer));

        bus.poke(SR_ADDR, SR_TXE | SR_RXNE);
        bus.queue_read(DR_ADDR, 0xBEEF);
        let mut buf = [0u8; 2];
        spi.receive(&mut buf).unwrap();
        assert_eq!(buf, [0xEF, 0xBE]);
    }

    #[test]
    fn test_transfer_loopback() {
        let bus = SimBus::new();
        bus.hook(loopback_model);
        let mut spi = spi(&bus, SpiConfig::default());

        let mut read = [0u8; 4];
        f4drv_hal::SpiBus::transfer(&mut spi, &mut read, &[1, 2, 3]).unwrap();
        assert_eq!(read, [1, 2, 3, 0]);

        let mut buf = [9u8, 8, 7];
        embedded_hal::spi::SpiBus::<u8>::transfer_in_place(&mut spi, &mut buf).unwrap();
        assert_eq!(buf, [9, 8, 7]);
        assert_eq!(bus.writes_to(DR_ADDR).len(), 7);
    }

    #[test]
    fn test_send_it_completes_once() {
        let bus = SimBus::new();
        let data = [0x10u8, 0x20, 0x30];
        let mut fired = 0;
        {
            let mut done = || fired += 1;
            let mut spi = spi(&bus, SpiConfig::default());
            spi.send_it(&data, Callback::Closure(&mut done)).unwrap();
            assert_eq!(bus.peek(CR2_ADDR) & CR2_TXEIE, CR2_TXEIE);
            assert_eq!(spi.tx_state(), TransferState::BusyTx);

            for _ in 0..3 {
                spi.handle_interrupt();
            }
            assert_eq!(spi.tx_state(), TransferState::Ready);
            // Further TXE entries find the source disabled
            spi.handle_interrupt();
        }
        assert_eq!(fired, 1);
        assert_eq!(bus.writes_to(DR_ADDR).as_slice(), &[0x10, 0x20, 0x30]);
        assert_eq!(bus.peek(CR2_ADDR) & CR2_TXEIE, 0);
    }

    #[test]
    fn test_send_it_busy_rejection() {
        let bus = SimBus::new();
        let first = [1u8, 2];
        let second = [3u8];
        let mut rx = [0u8; 1];
        let mut spi = spi(&bus, SpiConfig::default());

        spi.send_it(&first, Callback::Noop).unwrap();
        assert_eq!(spi.send_it(&second, Callback::Noop), Err(Error::Busy));
        assert_eq!(spi.tx_state(), TransferState::BusyTx);
        // The receive direction is independent
        assert_eq!(spi.receive_it(&mut rx, Callback::Noop), Ok(()));

        spi.handle_interrupt();
        spi.handle_interrupt();
        assert_eq!(bus.writes_to(DR_ADDR).as_slice(), &[1, 2]);
    }

    #[test]
    fn test_receive_it_16bit() {
        let bus = SimBus::new();
        let mut buf = [0u8; 4];
        let mut fired = 0;
        {
            let mut done = || fired += 1;
            let mut spi = spi(&bus, wide());
            spi.receive_it(&mut buf, Callback::Closure(&mut done))
                .unwrap();
            assert_eq!(bus.peek(CR2_ADDR) & CR2_RXNEIE, CR2_RXNEIE);

            bus.poke(SR_ADDR, SR_RXNE);
            bus.queue_read(DR_ADDR, 0x2211);
            bus.queue_read(DR_ADDR, 0x4433);
            spi.handle_interrupt();
            assert_eq!(spi.rx_state(), TransferState::BusyRx);
            spi.handle_interrupt();
            assert_eq!(spi.rx_state(), TransferState::Ready);
        }
        assert_eq!(fired, 1);
        assert_eq!(buf, [0x11, 0x22, 0x33, 0x44]);
        assert_eq!(bus.peek(CR2_ADDR) & CR2_RXNEIE, 0);
    }

    #[test]
    fn test_tx_and_rx_in_one_entry() {
        let bus = SimBus::new();
        bus.hook(loopback_model);
        let data = [0x5Au8];
        let mut buf = [0u8; 1];
        let mut spi = spi(&bus, SpiConfig::default());
        spi.receive_it(&mut buf, Callback::Noop).unwrap();
        spi.send_it(&data, Callback::Noop).unwrap();

        // TXE writes the frame, the loopback raises RXNE, the same entry reads it
        spi.handle_interrupt();
        assert!(spi.tx_state().is_ready());
        assert!(spi.rx_state().is_ready());
        drop(spi);
        assert_eq!(buf, [0x5A]);
    }

    #[test]
    fn test_overrun_reported_when_idle() {
        let bus = SimBus::new();
        let mut errors = 0;
        {
            let mut on_error = || errors += 1;
            let mut spi = spi(&bus, SpiConfig::default());

            // ERRIE still off
            bus.poke(SR_ADDR, SR_OVR);
            spi.handle_interrupt();

            spi.set_error_callback(Callback::Closure(&mut on_error));
            bus.clear_log();
            spi.handle_interrupt();

            let log = bus.accesses();
            let n = log.len();
            assert!(!log[n - 2].is_write() && log[n - 2].addr() == DR_ADDR);
            assert!(!log[n - 1].is_write() && log[n - 1].addr() == SR_ADDR);
        }
        assert_eq!(errors, 1);
    }

    #[test]
    fn test_stop_transmission_drops_callback() {
        let bus = SimBus::new();
        let data = [1u8, 2, 3, 4];
        let again = [5u8];
        let mut fired = 0;
        {
            let mut done = || fired += 1;
            let mut spi = spi(&bus, SpiConfig::default());
            spi.send_it(&data, Callback::Closure(&mut done)).unwrap();
            spi.handle_interrupt();
            spi.stop_transmission();

            assert_eq!(spi.tx_state(), TransferState::Ready);
            assert_eq!(bus.peek(CR2_ADDR) & CR2_TXEIE, 0);
            assert_eq!(spi.send_it(&again, Callback::Noop), Ok(()));
        }
        assert_eq!(fired, 0);
    }
}
