//! Transfer descriptors
//!
//! An engine's view of one in-flight asynchronous transfer: the
//! caller-owned buffer, the cursor into it, and the completion callback.
//! The descriptor borrows both buffer and callback for `'a`, so neither can
//! be dropped or reused while the engine holds it.

pub mod cursor;

pub use cursor::{RxCursor, TxCursor};

use crate::callback::Callback;

/// In-flight transmit
#[derive(Debug)]
pub struct TxTransfer<'a> {
    pub cursor: TxCursor<'a>,
    pub on_complete: Callback<'a>,
}

impl<'a> TxTransfer<'a> {
    /// Create a new transmit descriptor
    pub fn new(buf: &'a [u8], on_complete: Callback<'a>) -> Self {
        Self {
            cursor: TxCursor::new(buf),
            on_complete,
        }
    }

    /// Bytes still to send
    pub fn remaining(&self) -> usize {
        self.cursor.remaining()
    }

    /// Fire the completion callback, consuming the descriptor
    pub fn complete(mut self) {
        self.on_complete.call();
    }
}

/// In-flight receive
#[derive(Debug)]
pub struct RxTransfer<'a> {
    pub cursor: RxCursor<'a>,
    pub on_complete: Callback<'a>,
}

impl<'a> RxTransfer<'a> {
    /// Create a new receive descriptor
    pub fn new(buf: &'a mut [u8], on_complete: Callback<'a>) -> Self {
        Self {
            cursor: RxCursor::new(buf),
            on_complete,
        }
    }

    /// Bytes still to receive
    pub fn remaining(&self) -> usize {
        self.cursor.remaining()
    }

    /// Fire the completion callback, consuming the descriptor
    pub fn complete(mut self) {
        self.on_complete.call();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_completes_once() {
        let mut fired = 0;
        let data = [9u8, 8];
        {
            let mut done = || fired += 1;
            let mut xfer = TxTransfer::new(&data, Callback::Closure(&mut done));
            while xfer.cursor.next_u8().is_some() {}
            assert_eq!(xfer.remaining(), 0);
            xfer.complete();
        }
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_rx_fills_then_completes() {
        let mut fired = false;
        let mut buf = [0u8; 2];
        {
            let mut done = || fired = true;
            let mut xfer = RxTransfer::new(&mut buf, Callback::Closure(&mut done));
            xfer.cursor.push_u8(0x10);
            xfer.cursor.push_u8(0x20);
            assert_eq!(xfer.remaining(), 0);
            xfer.complete();
        }
        assert!(fired);
        assert_eq!(buf, [0x10, 0x20]);
    }
}
