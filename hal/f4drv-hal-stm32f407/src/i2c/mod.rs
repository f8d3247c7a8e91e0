//! I2C transaction engine
//!
//! Master transfers come in two flavours:
//!
//! - Polled (`master_write`, `master_read`): flag waits with no timeout. A
//!   slave that stretches the clock forever hangs the caller.
//! - Interrupt-driven (`master_write_it`, `master_read_it`): the call only
//!   reports whether the request was accepted. Progress happens in
//!   [`I2c::handle_event_interrupt`], completion and bus errors are
//!   delivered through the engine's [`EventCallback`].
//!
//! The engine is `Ready`, `BusyTx` or `BusyRx`; it never holds both
//! directions at once. Buffers handed to the interrupt-driven calls stay
//! borrowed by the engine until the transfer closes.
//!
//! # Receive ACK timing
//!
//! The peripheral acknowledges one byte ahead, so ACK must be cleared (and
//! STOP requested) before the data register is read:
//!
//! - single byte: ACK is cleared before ADDR is released, STOP precedes the
//!   one DR read
//! - N bytes: ACK is cleared and STOP requested when exactly two bytes
//!   remain, before the second-to-last DR read

mod regs;

pub use regs::I2cRegs;
use regs::*;

use f4drv_core::error::require_buffer;
use f4drv_core::timing::i2c as timing;
use f4drv_core::timing::FmDuty;
use f4drv_core::transfer::{RxCursor, TxCursor};
use f4drv_core::{Error, EventCallback, I2cEvent, Result, TransferEvent, TransferState};
use f4drv_hal::{I2cBus, RepeatedStart};

use crate::error::DriverError;
use crate::nvic::Irq;
use crate::ral::RegisterIo;
use crate::rcc::ClockGate;

// ============================================================================
// Instances and configuration
// ============================================================================

/// I2C unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cInstance {
    I2c1,
    I2c2,
    I2c3,
}

impl I2cInstance {
    /// Register block base address
    pub const fn base(&self) -> usize {
        match self {
            I2cInstance::I2c1 => 0x4000_5400,
            I2cInstance::I2c2 => 0x4000_5800,
            I2cInstance::I2c3 => 0x4000_5C00,
        }
    }

    /// Event interrupt vector
    pub const fn event_irq(&self) -> Irq {
        match self {
            I2cInstance::I2c1 => Irq::I2C1_EV,
            I2cInstance::I2c2 => Irq::I2C2_EV,
            I2cInstance::I2c3 => Irq::I2C3_EV,
        }
    }

    /// Error interrupt vector
    pub const fn error_irq(&self) -> Irq {
        match self {
            I2cInstance::I2c1 => Irq::I2C1_ER,
            I2cInstance::I2c2 => Irq::I2C2_ER,
            I2cInstance::I2c3 => Irq::I2C3_ER,
        }
    }

    /// Peripheral clock gate (APB1)
    pub const fn clock_gate(&self) -> ClockGate {
        match self {
            I2cInstance::I2c1 => ClockGate::I2c1,
            I2cInstance::I2c2 => ClockGate::I2c2,
            I2cInstance::I2c3 => ClockGate::I2c3,
        }
    }
}

/// SCL frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cSpeed {
    /// 100 kHz
    #[default]
    Standard,
    /// 200 kHz
    Fast2k,
    /// 400 kHz
    Fast4k,
    /// Any other rate, in Hz
    Custom(u32),
}

impl I2cSpeed {
    pub const fn hz(&self) -> u32 {
        match self {
            I2cSpeed::Standard => 100_000,
            I2cSpeed::Fast2k => 200_000,
            I2cSpeed::Fast4k => 400_000,
            I2cSpeed::Custom(hz) => *hz,
        }
    }
}

/// Acknowledge policy for received bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AckControl {
    #[default]
    Enabled,
    Disabled,
}

/// I2C configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cConfig {
    pub scl_speed: I2cSpeed,
    /// 7-bit own address (slave mode)
    pub own_address: u8,
    pub ack: AckControl,
    /// Only used in fast mode
    pub duty: FmDuty,
}

impl I2cConfig {
    /// 100 kHz, ACK on, own address 0
    pub const STANDARD: Self = Self {
        scl_speed: I2cSpeed::Standard,
        own_address: 0,
        ack: AckControl::Enabled,
        duty: FmDuty::Ratio2,
    };
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self::STANDARD
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Interrupt sources owned by a master session
const SESSION_IRQS: u32 = CR2_ITBUFEN | CR2_ITEVTEN | CR2_ITERREN;

/// I2C engine for one unit
pub struct I2c<'a, IO> {
    regs: I2cRegs<IO>,
    config: I2cConfig,
    state: TransferState,
    tx: Option<TxCursor<'a>>,
    rx: Option<RxCursor<'a>>,
    /// Length of the receive that is in flight
    rx_size: usize,
    address: u8,
    repeated_start: RepeatedStart,
    callback: EventCallback<'a, I2cEvent>,
}

impl<'a, IO: RegisterIo> I2c<'a, IO> {
    /// Create a new engine; call [`I2c::init`] before use
    pub fn new(regs: I2cRegs<IO>, config: I2cConfig) -> Self {
        Self {
            regs,
            config,
            state: TransferState::Ready,
            tx: None,
            rx: None,
            rx_size: 0,
            address: 0,
            repeated_start: RepeatedStart::Disabled,
            callback: EventCallback::Noop,
        }
    }

    /// Program clock control and own address, then enable the peripheral
    ///
    /// `apb1_hz` comes from [`crate::rcc::Rcc::apb1_hz`]; it must be at
    /// least 2 MHz.
    pub fn init(&mut self, apb1_hz: u32) -> Result<()> {
        let scl_hz = self.config.scl_speed.hz();
        let freq = timing::freq_field(apb1_hz);
        if scl_hz == 0 || freq < 2 {
            warn!("i2c: bad clocking apb1={} scl={}", apb1_hz, scl_hz);
            return Err(Error::InvalidArgument);
        }

        self.regs.set_enabled(false);
        self.regs.set_freq(freq);
        self.regs.set_own_address(self.config.own_address);
        self.regs
            .set_ccr(timing::ccr(apb1_hz, scl_hz, self.config.duty));
        self.regs.set_trise(timing::trise(apb1_hz, scl_hz));
        self.regs.set_enabled(true);
        self.regs.set_ack(self.config.ack == AckControl::Enabled);

        info!("i2c@{=usize:#x}: {} Hz", self.regs.base(), scl_hz);
        Ok(())
    }

    /// Register handle
    pub fn regs(&self) -> &I2cRegs<IO> {
        &self.regs
    }

    pub fn config(&self) -> &I2cConfig {
        &self.config
    }

    /// Current transfer state
    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Replace the application callback
    pub fn set_callback(&mut self, callback: EventCallback<'a, I2cEvent>) {
        self.callback = callback;
    }

    /// Slave addresses are 7-bit; the R/W bit is added on the wire
    fn check_address(address: u8) -> Result<()> {
        if address > 0x7F {
            warn!("i2c: address {=u8:#x} is not 7-bit", address);
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.state.is_busy() {
            warn!("i2c: busy ({})", self.state);
            return Err(Error::Busy);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Polled master API
    // ------------------------------------------------------------------------

    /// Write `data` to the 7-bit `address`
    ///
    /// Ends with STOP unless `repeated_start` keeps the bus.
    pub fn master_write(
        &mut self,
        address: u8,
        data: &[u8],
        repeated_start: RepeatedStart,
    ) -> Result<()> {
        require_buffer(data.len())?;
        Self::check_address(address)?;
        self.ensure_ready()?;

        self.regs.generate_start();
        self.regs.wait_flag(SR1_SB);
        self.regs.write_data(address << 1);
        self.regs.wait_flag(SR1_ADDR);
        self.regs.clear_addr();

        for &byte in data {
            self.regs.wait_flag(SR1_TXE);
            self.regs.write_data(byte);
        }

        // The last byte may still be shifting out while TXE is already set
        self.regs.wait_flag(SR1_TXE | SR1_BTF);
        if repeated_start.sends_stop() {
            self.regs.generate_stop();
        }
        Ok(())
    }

    /// Fill `buf` from the 7-bit `address`
    pub fn master_read(
        &mut self,
        address: u8,
        buf: &mut [u8],
        repeated_start: RepeatedStart,
    ) -> Result<()> {
        require_buffer(buf.len())?;
        Self::check_address(address)?;
        self.ensure_ready()?;

        self.regs.generate_start();
        self.regs.wait_flag(SR1_SB);
        self.regs.write_data((address << 1) | 1);
        self.regs.wait_flag(SR1_ADDR);

        if let [only] = buf {
            self.regs.set_ack(false);
            self.regs.clear_addr();
            self.regs.wait_flag(SR1_RXNE);
            if repeated_start.sends_stop() {
                self.regs.generate_stop();
            }
            *only = self.regs.read_data();
        } else {
            self.regs.clear_addr();
            let len = buf.len();
            for (i, slot) in buf.iter_mut().enumerate() {
                self.regs.wait_flag(SR1_RXNE);
                if len - i == 2 {
                    self.regs.set_ack(false);
                    if repeated_start.sends_stop() {
                        self.regs.generate_stop();
                    }
                }
                *slot = self.regs.read_data();
            }
        }

        if self.config.ack == AckControl::Enabled {
            self.regs.set_ack(true);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Slave data path
    // ------------------------------------------------------------------------

    /// Load the next byte for the master (answer to `DataRequest`)
    pub fn slave_send_byte(&mut self, byte: u8) {
        self.regs.write_data(byte);
    }

    /// Take the byte the master wrote (answer to `DataReceived`)
    pub fn slave_receive_byte(&mut self) -> u8 {
        self.regs.read_data()
    }

    /// Enable or disable slave-mode event and error interrupts
    pub fn set_slave_interrupts(&mut self, on: bool) {
        self.regs.set_interrupts(SESSION_IRQS, on);
    }

    // ------------------------------------------------------------------------
    // Interrupt-driven master API
    // ------------------------------------------------------------------------

    /// Start an interrupt-driven write of `data` to `address`
    ///
    /// Returns `Busy` while any transfer is outstanding. Completion is
    /// reported as [`I2cEvent::TxComplete`].
    pub fn master_write_it(
        &mut self,
        address: u8,
        data: &'a [u8],
        repeated_start: RepeatedStart,
    ) -> Result<()> {
        require_buffer(data.len())?;
        Self::check_address(address)?;
        self.ensure_ready()?;
        self.state.begin(TransferEvent::BeginTx)?;

        self.tx = Some(TxCursor::new(data));
        self.address = address;
        self.repeated_start = repeated_start;
        trace!("i2c: tx {} bytes to {=u8:#x}", data.len(), address);

        self.regs.generate_start();
        self.regs.set_interrupts(SESSION_IRQS, true);
        Ok(())
    }

    /// Start an interrupt-driven read into `buf` from `address`
    ///
    /// Returns `Busy` while any transfer is outstanding. Completion is
    /// reported as [`I2cEvent::RxComplete`].
    pub fn master_read_it(
        &mut self,
        address: u8,
        buf: &'a mut [u8],
        repeated_start: RepeatedStart,
    ) -> Result<()> {
        require_buffer(buf.len())?;
        Self::check_address(address)?;
        self.ensure_ready()?;
        self.state.begin(TransferEvent::BeginRx)?;

        self.rx_size = buf.len();
        self.rx = Some(RxCursor::new(buf));
        self.address = address;
        self.repeated_start = repeated_start;
        trace!("i2c: rx {} bytes from {=u8:#x}", self.rx_size, address);

        self.regs.generate_start();
        self.regs.set_interrupts(SESSION_IRQS, true);
        Ok(())
    }

    /// End a send session: event/buffer interrupts off, back to `Ready`
    pub fn close_send(&mut self) {
        self.regs.set_interrupts(CR2_ITBUFEN | CR2_ITEVTEN, false);
        self.state.finish();
        self.tx = None;
    }

    /// End a receive session and restore the configured ACK policy
    pub fn close_receive(&mut self) {
        self.regs.set_interrupts(CR2_ITBUFEN | CR2_ITEVTEN, false);
        self.state.finish();
        self.rx = None;
        self.rx_size = 0;
        if self.config.ack == AckControl::Enabled {
            self.regs.set_ack(true);
        }
    }

    /// Event vector body
    ///
    /// Flags are examined in a fixed order: SB, ADDR, BTF, STOPF, TXE,
    /// RXNE. Everything needs ITEVTEN; TXE and RXNE also need ITBUFEN.
    pub fn handle_event_interrupt(&mut self) {
        if !self.regs.interrupts_enabled(CR2_ITEVTEN) {
            return;
        }
        let buffered = self.regs.interrupts_enabled(CR2_ITBUFEN);

        // Start sent: address phase (master only)
        if self.regs.flag(SR1_SB) {
            match self.state {
                TransferState::BusyTx => self.regs.write_data(self.address << 1),
                TransferState::BusyRx => self.regs.write_data((self.address << 1) | 1),
                TransferState::Ready => {}
            }
        }

        // Address sent (master) or matched (slave)
        if self.regs.flag(SR1_ADDR) {
            if self.state == TransferState::BusyRx && self.rx_size == 1 {
                self.regs.set_ack(false);
            }
            self.regs.clear_addr();
        }

        if self.regs.flag(SR1_BTF) && self.state == TransferState::BusyTx {
            let drained = self.tx.as_ref().map_or(true, |tx| tx.is_done());
            if drained && self.regs.flag(SR1_TXE) {
                if self.repeated_start.sends_stop() {
                    self.regs.generate_stop();
                }
                self.close_send();
                trace!("i2c: tx complete");
                self.callback.call(I2cEvent::TxComplete);
            }
        }

        // Slave only; never set in master mode
        if self.regs.flag(SR1_STOPF) {
            self.regs.clear_stopf();
            self.callback.call(I2cEvent::Stop);
        }

        // A master session is identified by the engine state; MSL may
        // already be clear once STOP has gone out
        if buffered && self.regs.flag(SR1_TXE) {
            if self.state == TransferState::BusyTx {
                if let Some(byte) = self.tx.as_mut().and_then(|tx| tx.next_u8()) {
                    self.regs.write_data(byte);
                }
            } else if !self.regs.is_master() && self.regs.is_transmitter() {
                self.callback.call(I2cEvent::DataRequest);
            }
        }

        if buffered && self.regs.flag(SR1_RXNE) {
            if self.state == TransferState::BusyRx {
                self.receive_next();
            } else if !self.regs.is_master() && !self.regs.is_transmitter() {
                self.callback.call(I2cEvent::DataReceived);
            }
        }
    }

    fn receive_next(&mut self) {
        let Some(rx) = self.rx.as_mut() else {
            return;
        };

        if self.rx_size == 1 {
            if self.repeated_start.sends_stop() {
                self.regs.generate_stop();
            }
        } else if rx.remaining() == 2 {
            self.regs.set_ack(false);
            if self.repeated_start.sends_stop() {
                self.regs.generate_stop();
            }
        }

        rx.push_u8(self.regs.read_data());
        if rx.is_done() {
            self.close_receive();
            trace!("i2c: rx complete");
            self.callback.call(I2cEvent::RxComplete);
        }
    }

    /// Error vector body
    ///
    /// Each raised error flag is cleared and reported. The engine never
    /// retries or aborts on its own.
    pub fn handle_error_interrupt(&mut self) {
        if !self.regs.interrupts_enabled(CR2_ITERREN) {
            return;
        }

        const ERRORS: [(u32, I2cEvent); 5] = [
            (SR1_BERR, I2cEvent::BusError),
            (SR1_ARLO, I2cEvent::ArbitrationLost),
            (SR1_AF, I2cEvent::AckFailure),
            (SR1_OVR, I2cEvent::Overrun),
            (SR1_TIMEOUT, I2cEvent::Timeout),
        ];

        for (flag, event) in ERRORS {
            if self.regs.flag(flag) {
                self.regs.clear_error(flag);
                warn!("i2c: {}", event);
                self.callback.call(event);
            }
        }
    }
}

impl<IO: RegisterIo> I2cBus for I2c<'_, IO> {
    type Error = DriverError;

    fn write(&mut self, address: u8, data: &[u8]) -> core::result::Result<(), Self::Error> {
        Ok(self.master_write(address, data, RepeatedStart::Disabled)?)
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> core::result::Result<(), Self::Error> {
        Ok(self.master_read(address, buf, RepeatedStart::Disabled)?)
    }

    fn write_read(
        &mut self,
        address: u8,
        data: &[u8],
        buf: &mut [u8],
    ) -> core::result::Result<(), Self::Error> {
        self.master_write(address, data, RepeatedStart::Enabled)?;
        Ok(self.master_read(address, buf, RepeatedStart::Disabled)?)
    }
}
