//! Events driving transfer states and application callbacks

/// Events that can trigger transfer state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferEvent {
    /// Transmit accepted
    BeginTx,
    /// Receive accepted
    BeginRx,
    /// Remaining length reached zero
    Complete,
    /// Stopped or closed before completion
    Abort,
}

/// I2C event tag passed to the application callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cEvent {
    // Master completion
    /// Master transmit finished
    TxComplete,
    /// Master receive finished
    RxComplete,

    // Slave events
    /// Stop condition detected
    Stop,
    /// Master is reading from us; supply the next byte
    DataRequest,
    /// Master wrote a byte to us; read it
    DataReceived,

    // Bus errors
    /// Misplaced start or stop condition
    BusError,
    /// Arbitration lost to another master
    ArbitrationLost,
    /// No acknowledge returned
    AckFailure,
    /// Overrun or underrun
    Overrun,
    /// Timeout or Tlow error
    Timeout,
}

impl I2cEvent {
    /// Check if this event reports a bus error
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            I2cEvent::BusError
                | I2cEvent::ArbitrationLost
                | I2cEvent::AckFailure
                | I2cEvent::Overrun
                | I2cEvent::Timeout
        )
    }

    /// Check if this event ends a master transfer
    pub fn is_completion(&self) -> bool {
        matches!(self, I2cEvent::TxComplete | I2cEvent::RxComplete)
    }

    /// Check if this event is raised in slave mode
    pub fn is_slave_event(&self) -> bool {
        matches!(
            self,
            I2cEvent::Stop | I2cEvent::DataRequest | I2cEvent::DataReceived
        )
    }
}
