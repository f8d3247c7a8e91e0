//! USART transfer engine
//!
//! One buffer element is one frame on the wire. Its size in the buffer
//! depends on the word length and parity:
//!
//! | Word | Parity | Buffer bytes | Data bits kept |
//! |------|--------|--------------|----------------|
//! | 8    | none   | 1            | 8              |
//! | 8    | on     | 1            | 7              |
//! | 9    | none   | 2 (LE)       | 9              |
//! | 9    | on     | 1            | 8              |
//!
//! Buffer lengths are byte counts and must hold whole frames.
//!
//! An interrupt-driven send is complete when the transmission-complete
//! flag rises after the last frame, not when the last frame is loaded.

mod regs;

pub use regs::UsartRegs;
use regs::*;

use f4drv_core::clock::Bus;
use f4drv_core::error::require_buffer;
use f4drv_core::timing::usart as timing;
use f4drv_core::timing::Oversampling;
use f4drv_core::transfer::{RxTransfer, TxTransfer};
use f4drv_core::{Callback, Error, Result, TransferEvent, TransferState};
use f4drv_hal::{DataBits, Parity, StopBits, UartRx, UartTx};

use crate::error::DriverError;
use crate::nvic::Irq;
use crate::ral::RegisterIo;
use crate::rcc::ClockGate;

// ============================================================================
// Instances and configuration
// ============================================================================

/// USART/UART unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsartInstance {
    Usart1,
    Usart2,
    Usart3,
    Uart4,
    Uart5,
    Usart6,
}

impl UsartInstance {
    /// Register block base address
    pub const fn base(&self) -> usize {
        match self {
            UsartInstance::Usart1 => 0x4001_1000,
            UsartInstance::Usart2 => 0x4000_4400,
            UsartInstance::Usart3 => 0x4000_4800,
            UsartInstance::Uart4 => 0x4000_4C00,
            UsartInstance::Uart5 => 0x4000_5000,
            UsartInstance::Usart6 => 0x4001_1400,
        }
    }

    pub const fn irq(&self) -> Irq {
        match self {
            UsartInstance::Usart1 => Irq::USART1,
            UsartInstance::Usart2 => Irq::USART2,
            UsartInstance::Usart3 => Irq::USART3,
            UsartInstance::Uart4 => Irq::UART4,
            UsartInstance::Uart5 => Irq::UART5,
            UsartInstance::Usart6 => Irq::USART6,
        }
    }

    pub const fn clock_gate(&self) -> ClockGate {
        match self {
            UsartInstance::Usart1 => ClockGate::Usart1,
            UsartInstance::Usart2 => ClockGate::Usart2,
            UsartInstance::Usart3 => ClockGate::Usart3,
            UsartInstance::Uart4 => ClockGate::Uart4,
            UsartInstance::Uart5 => ClockGate::Uart5,
            UsartInstance::Usart6 => ClockGate::Usart6,
        }
    }

    /// Bus whose clock feeds the baud-rate generator
    pub const fn bus(&self) -> Bus {
        match self {
            UsartInstance::Usart1 | UsartInstance::Usart6 => Bus::Apb2,
            _ => Bus::Apb1,
        }
    }
}

/// Enabled directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsartMode {
    TxOnly,
    RxOnly,
    #[default]
    TxRx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlowControl {
    #[default]
    None,
    Cts,
    Rts,
    CtsRts,
}

/// Standard baud rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BaudRate {
    B1200,
    B2400,
    B9600,
    B19200,
    B38400,
    B57600,
    #[default]
    B115200,
    B230400,
    B460800,
    B921600,
    B2M,
    B3M,
    Custom(u32),
}

impl BaudRate {
    pub const fn hz(&self) -> u32 {
        match self {
            BaudRate::B1200 => 1200,
            BaudRate::B2400 => 2400,
            BaudRate::B9600 => 9600,
            BaudRate::B19200 => 19_200,
            BaudRate::B38400 => 38_400,
            BaudRate::B57600 => 57_600,
            BaudRate::B115200 => 115_200,
            BaudRate::B230400 => 230_400,
            BaudRate::B460800 => 460_800,
            BaudRate::B921600 => 921_600,
            BaudRate::B2M => 2_000_000,
            BaudRate::B3M => 3_000_000,
            BaudRate::Custom(hz) => *hz,
        }
    }
}

/// USART configuration; the default is 115200 8N1 without flow control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UsartConfig {
    pub mode: UsartMode,
    pub baud_rate: BaudRate,
    pub word_length: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    pub oversampling: Oversampling,
}

impl UsartConfig {
    /// Buffer bytes per frame
    pub fn frame_bytes(&self) -> usize {
        match (self.word_length, self.parity) {
            (DataBits::Nine, Parity::None) => 2,
            _ => 1,
        }
    }

    /// Data bits kept from a received frame
    pub fn rx_mask(&self) -> u16 {
        match (self.word_length, self.parity) {
            (DataBits::Nine, Parity::None) => 0x1FF,
            (DataBits::Eight, Parity::Even | Parity::Odd) => 0x7F,
            _ => 0xFF,
        }
    }

    /// CR1 value for this configuration, UE clear
    pub fn cr1(&self) -> u32 {
        let mut cr1 = match self.mode {
            UsartMode::TxOnly => CR1_TE,
            UsartMode::RxOnly => CR1_RE,
            UsartMode::TxRx => CR1_TE | CR1_RE,
        };
        if self.word_length == DataBits::Nine {
            cr1 |= CR1_M;
        }
        match self.parity {
            Parity::None => {}
            Parity::Even => cr1 |= CR1_PCE,
            Parity::Odd => cr1 |= CR1_PCE | CR1_PS,
        }
        if self.oversampling == Oversampling::By8 {
            cr1 |= CR1_OVER8;
        }
        cr1
    }

    /// CR2.STOP encoding
    pub fn stop_bits_field(&self) -> u32 {
        match self.stop_bits {
            StopBits::One => 0b00,
            StopBits::Half => 0b01,
            StopBits::Two => 0b10,
            StopBits::OneAndHalf => 0b11,
        }
    }
}

/// Receive error flags latched in SR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UsartEvent {
    pub parity: bool,
    pub framing: bool,
    pub noise: bool,
    pub overrun: bool,
}

impl UsartEvent {
    pub fn from_status(sr: u32) -> Self {
        Self {
            parity: sr & SR_PE != 0,
            framing: sr & SR_FE != 0,
            noise: sr & SR_NF != 0,
            overrun: sr & SR_ORE != 0,
        }
    }

    /// Check if any error is flagged
    pub fn any(&self) -> bool {
        self.parity || self.framing || self.noise || self.overrun
    }
}

// ============================================================================
// Engine
// ============================================================================

/// USART engine for one unit
pub struct Usart<'a, IO> {
    regs: UsartRegs<IO>,
    config: UsartConfig,
    tx_state: TransferState,
    rx_state: TransferState,
    tx: Option<TxTransfer<'a>>,
    rx: Option<RxTransfer<'a>>,
}

impl<'a, IO: RegisterIo> Usart<'a, IO> {
    /// Create a new engine; call [`Usart::init`] before use
    pub fn new(regs: UsartRegs<IO>, config: UsartConfig) -> Self {
        Self {
            regs,
            config,
            tx_state: TransferState::Ready,
            rx_state: TransferState::Ready,
            tx: None,
            rx: None,
        }
    }

    /// Program the frame format and baud rate, then set UE
    ///
    /// `pclk_hz` is the clock of the unit's bus ([`UsartInstance::bus`]),
    /// as reported by [`crate::rcc::Rcc::pclk_for`].
    pub fn init(&mut self, pclk_hz: u32) -> Result<()> {
        let baud = self.config.baud_rate.hz();
        let brr = timing::brr(pclk_hz, baud, self.config.oversampling);
        if brr >> 4 == 0 {
            warn!("usart: {} baud unreachable from {} Hz", baud, pclk_hz);
            return Err(Error::InvalidArgument);
        }

        self.regs.write_cr1(self.config.cr1());
        self.regs.set_stop_bits(self.config.stop_bits_field());
        let (rts, cts) = match self.config.flow_control {
            FlowControl::None => (false, false),
            FlowControl::Cts => (false, true),
            FlowControl::Rts => (true, false),
            FlowControl::CtsRts => (true, true),
        };
        self.regs.set_flow_control(rts, cts);
        self.regs.set_brr(brr);
        self.regs.set_enabled(true);

        info!("usart@{=usize:#x}: {} baud", self.regs.base(), baud);
        Ok(())
    }

    pub fn regs(&self) -> &UsartRegs<IO> {
        &self.regs
    }

    pub fn config(&self) -> &UsartConfig {
        &self.config
    }

    pub fn tx_state(&self) -> TransferState {
        self.tx_state
    }

    pub fn rx_state(&self) -> TransferState {
        self.rx_state
    }

    /// Receive error flags currently latched
    pub fn errors(&self) -> UsartEvent {
        UsartEvent::from_status(self.regs.status())
    }

    fn check_len(&self, len: usize) -> Result<()> {
        require_buffer(len)?;
        if len % self.config.frame_bytes() != 0 {
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }

    fn write_frame(&self, frame: &[u8]) {
        let value = match *frame {
            [lo, hi] => u16::from_le_bytes([lo, hi]) & 0x1FF,
            [byte] => byte as u16,
            _ => return,
        };
        self.regs.write_data(value);
    }

    fn read_frame(&self, frame: &mut [u8]) {
        let value = self.regs.read_data() & self.config.rx_mask();
        match frame {
            [lo, hi] => [*lo, *hi] = value.to_le_bytes(),
            [byte] => *byte = value as u8,
            _ => {}
        }
    }

    // ------------------------------------------------------------------------
    // Polled API (busy-waits without timeout)
    // ------------------------------------------------------------------------

    /// Send `data`, one frame per TXE, then wait for TC
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        self.check_len(data.len())?;
        for frame in data.chunks(self.config.frame_bytes()) {
            self.regs.wait_flag(SR_TXE);
            self.write_frame(frame);
        }
        self.regs.wait_flag(SR_TC);
        Ok(())
    }

    /// Fill `buf`, one frame per RXNE
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<()> {
        self.check_len(buf.len())?;
        for frame in buf.chunks_mut(self.config.frame_bytes()) {
            self.regs.wait_flag(SR_RXNE);
            self.read_frame(frame);
        }
        Ok(())
    }

    /// Wait for the last frame to leave the shifter
    pub fn flush(&mut self) {
        self.regs.wait_flag(SR_TC);
    }

    // ------------------------------------------------------------------------
    // Interrupt-driven API
    // ------------------------------------------------------------------------

    /// Start an interrupt-driven send
    ///
    /// Enables TXE and TC interrupts. `on_complete` runs once TC rises
    /// after the last frame.
    pub fn send_it(&mut self, data: &'a [u8], on_complete: Callback<'a>) -> Result<()> {
        self.check_len(data.len())?;
        if let Err(e) = self.tx_state.begin(TransferEvent::BeginTx) {
            warn!("usart: send rejected ({})", self.tx_state);
            return Err(e);
        }
        trace!("usart: tx {} bytes", data.len());
        self.tx = Some(TxTransfer::new(data, on_complete));
        self.regs.set_interrupts(CR1_TXEIE | CR1_TCIE, true);
        Ok(())
    }

    /// Start an interrupt-driven receive
    pub fn receive_it(&mut self, buf: &'a mut [u8], on_complete: Callback<'a>) -> Result<()> {
        self.check_len(buf.len())?;
        if let Err(e) = self.rx_state.begin(TransferEvent::BeginRx) {
            warn!("usart: receive rejected ({})", self.rx_state);
            return Err(e);
        }
        trace!("usart: rx {} bytes", buf.len());
        self.rx = Some(RxTransfer::new(buf, on_complete));
        self.regs.set_interrupts(CR1_RXNEIE, true);
        Ok(())
    }

    /// Abandon the send in flight; its callback is dropped without running
    pub fn stop_transmission(&mut self) {
        self.regs.set_interrupts(CR1_TXEIE | CR1_TCIE, false);
        self.tx_state.abort();
        self.tx = None;
    }

    /// Abandon the receive in flight; its callback is dropped without running
    pub fn stop_reception(&mut self) {
        self.regs.set_interrupts(CR1_RXNEIE, false);
        self.rx_state.abort();
        self.rx = None;
    }

    /// Interrupt vector body
    ///
    /// TC, TXE and RXNE are each checked on every entry, each gated on its
    /// own enable bit.
    pub fn handle_interrupt(&mut self) {
        if self.regs.flag(SR_TC) && self.regs.interrupts_enabled(CR1_TCIE) {
            self.complete_transmission();
        }
        if self.regs.flag(SR_TXE) && self.regs.interrupts_enabled(CR1_TXEIE) {
            self.transmit_next();
        }
        if self.regs.flag(SR_RXNE) && self.regs.interrupts_enabled(CR1_RXNEIE) {
            self.receive_next();
        }
    }

    fn complete_transmission(&mut self) {
        if self.tx_state != TransferState::BusyTx {
            return;
        }
        if self.tx.as_ref().is_some_and(|tx| tx.remaining() > 0) {
            return;
        }
        self.regs.clear_tc();
        self.regs.set_interrupts(CR1_TCIE, false);
        self.tx_state.finish();
        if let Some(done) = self.tx.take() {
            trace!("usart: tx complete");
            done.complete();
        }
    }

    fn transmit_next(&mut self) {
        if self.tx_state != TransferState::BusyTx {
            return;
        }
        let width = self.config.frame_bytes();
        let Some(tx) = self.tx.as_mut() else {
            return;
        };

        let value = match width {
            2 => tx.cursor.next_u16().map(|v| v & 0x1FF),
            _ => tx.cursor.next_u8().map(u16::from),
        };
        if let Some(value) = value {
            self.regs.write_data(value);
        }
        // Completion is left to TC
        if tx.remaining() == 0 {
            self.regs.set_interrupts(CR1_TXEIE, false);
        }
    }

    fn receive_next(&mut self) {
        if self.rx_state != TransferState::BusyRx {
            return;
        }
        let mask = self.config.rx_mask();
        let Some(rx) = self.rx.as_mut() else {
            return;
        };

        let value = self.regs.read_data() & mask;
        if mask == 0x1FF {
            rx.cursor.push_u16(value);
        } else {
            rx.cursor.push_u8(value as u8);
        }

        if rx.remaining() == 0 {
            self.regs.set_interrupts(CR1_RXNEIE, false);
            self.rx_state.finish();
            if let Some(done) = self.rx.take() {
                trace!("usart: rx complete");
                done.complete();
            }
        }
    }
}

// ============================================================================
// Trait implementations
// ============================================================================

impl<IO: RegisterIo> UartTx for Usart<'_, IO> {
    type Error = DriverError;

    fn write_blocking(&mut self, data: &[u8]) -> core::result::Result<(), Self::Error> {
        Ok(self.send(data)?)
    }

    fn flush(&mut self) -> core::result::Result<(), Self::Error> {
        Usart::flush(self);
        Ok(())
    }
}

impl<IO: RegisterIo> UartRx for Usart<'_, IO> {
    type Error = DriverError;

    fn read_blocking(&mut self, buf: &mut [u8]) -> core::result::Result<usize, Self::Error> {
        self.receive(buf)?;
        Ok(buf.len())
    }
}

impl<IO> embedded_io::ErrorType for Usart<'_, IO> {
    type Error = DriverError;
}

impl<IO: RegisterIo> embedded_io::Write for Usart<'_, IO> {
    fn write(&mut self, buf: &[u8]) -> core::result::Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.send(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> core::result::Result<(), Self::Error> {
        Usart::flush(self);
        Ok(())
    }
}

impl<IO: RegisterIo> embedded_io::Read for Usart<'_, IO> {
    /// Blocks for exactly one frame
    fn read(&mut self, buf: &mut [u8]) -> core::result::Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        let width = self.config.frame_bytes();
        let frame = buf.get_mut(..width).ok_or(Error::InvalidArgument)?;
        self.receive(frame)?;
        Ok(width)
    }
}
