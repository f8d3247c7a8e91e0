//! Transfer state definition

use super::events::TransferEvent;
use crate::error::{Error, Result};

/// Engine transfer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferState {
    /// No transfer outstanding
    #[default]
    Ready,
    /// Transmit in flight
    BusyTx,
    /// Receive in flight
    BusyRx,
}

impl TransferState {
    /// Check if a new transfer may start
    pub fn is_ready(&self) -> bool {
        matches!(self, TransferState::Ready)
    }

    /// Check if a transfer is outstanding in either direction
    pub fn is_busy(&self) -> bool {
        !self.is_ready()
    }

    /// Process an event and return the next state
    ///
    /// Events that do not apply to the current state leave it unchanged; in
    /// particular a second `BeginTx`/`BeginRx` while busy is ignored.
    pub fn transition(self, event: TransferEvent) -> Self {
        use TransferEvent::*;
        use TransferState::*;

        match (self, event) {
            (Ready, BeginTx) => BusyTx,
            (Ready, BeginRx) => BusyRx,

            (BusyTx, Complete) | (BusyTx, Abort) => Ready,
            (BusyRx, Complete) | (BusyRx, Abort) => Ready,

            // Default: stay in current state
            _ => self,
        }
    }

    /// Start a transfer, rejecting the request unless `Ready`
    ///
    /// On rejection the current state is left untouched.
    pub fn begin(&mut self, event: TransferEvent) -> Result<()> {
        if !self.is_ready() {
            return Err(Error::Busy);
        }
        *self = self.transition(event);
        Ok(())
    }

    /// Return to `Ready` after completion
    pub fn finish(&mut self) {
        *self = self.transition(TransferEvent::Complete);
    }

    /// Return to `Ready` after an explicit stop
    pub fn abort(&mut self) {
        *self = self.transition(TransferEvent::Abort);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_to_busy() {
        assert_eq!(
            TransferState::Ready.transition(TransferEvent::BeginTx),
            TransferState::BusyTx
        );
        assert_eq!(
            TransferState::Ready.transition(TransferEvent::BeginRx),
            TransferState::BusyRx
        );
    }

    #[test]
    fn test_busy_back_to_ready() {
        let states = [TransferState::BusyTx, TransferState::BusyRx];

        for state in states {
            assert_eq!(state.transition(TransferEvent::Complete), TransferState::Ready);
            assert_eq!(state.transition(TransferEvent::Abort), TransferState::Ready);
        }
    }

    #[test]
    fn test_no_concurrent_occupancy() {
        // A busy engine never switches direction
        let tx = TransferState::BusyTx;
        assert_eq!(tx.transition(TransferEvent::BeginRx), TransferState::BusyTx);

        let rx = TransferState::BusyRx;
        assert_eq!(rx.transition(TransferEvent::BeginTx), TransferState::BusyRx);
    }

    #[test]
    fn test_ready_ignores_completion() {
        let ready = TransferState::Ready;
        assert_eq!(ready.transition(TransferEvent::Complete), TransferState::Ready);
        assert_eq!(ready.transition(TransferEvent::Abort), TransferState::Ready);
    }

    #[test]
    fn test_begin_rejects_when_busy() {
        let mut state = TransferState::Ready;
        assert_eq!(state.begin(TransferEvent::BeginRx), Ok(()));
        assert_eq!(state, TransferState::BusyRx);

        // Rejection is idempotent and leaves the in-flight state alone
        assert_eq!(state.begin(TransferEvent::BeginTx), Err(Error::Busy));
        assert_eq!(state.begin(TransferEvent::BeginRx), Err(Error::Busy));
        assert_eq!(state, TransferState::BusyRx);

        state.finish();
        assert!(state.is_ready());
    }

    #[test]
    fn test_abort_flow() {
        let mut state = TransferState::Ready;
        state.begin(TransferEvent::BeginTx).unwrap();
        assert!(state.is_busy());
        state.abort();
        assert_eq!(state, TransferState::Ready);
    }
}
