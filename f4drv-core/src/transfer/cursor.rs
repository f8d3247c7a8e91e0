//! Buffer cursors
//!
//! A cursor walks a caller-owned buffer one byte or one little-endian
//! half-word at a time and reports how many bytes remain. The remaining
//! count is always a byte count, whatever the frame width.

/// Read cursor over a transmit buffer
#[derive(Debug)]
pub struct TxCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> TxCursor<'a> {
    /// Create a new cursor at the start of `buf`
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Check if every byte has been consumed
    pub fn is_done(&self) -> bool {
        self.remaining() == 0
    }

    /// Total buffer length
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Take the next byte
    pub fn next_u8(&mut self) -> Option<u8> {
        let byte = *self.buf.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    /// Take the next two bytes as a little-endian half-word
    ///
    /// Returns `None` without advancing when fewer than two bytes remain.
    pub fn next_u16(&mut self) -> Option<u16> {
        if self.remaining() < 2 {
            return None;
        }
        let value = u16::from_le_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        Some(value)
    }
}

/// Write cursor over a receive buffer
#[derive(Debug)]
pub struct RxCursor<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> RxCursor<'a> {
    /// Create a new cursor at the start of `buf`
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet filled
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Check if the buffer is full
    pub fn is_done(&self) -> bool {
        self.remaining() == 0
    }

    /// Total buffer length
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Store one byte; returns false when the buffer is already full
    pub fn push_u8(&mut self, byte: u8) -> bool {
        match self.buf.get_mut(self.pos) {
            Some(slot) => {
                *slot = byte;
                self.pos += 1;
                true
            }
            None => false,
        }
    }

    /// Store a half-word as two little-endian bytes
    ///
    /// Returns false without writing when fewer than two bytes remain.
    pub fn push_u16(&mut self, value: u16) -> bool {
        if self.remaining() < 2 {
            return false;
        }
        let [lo, hi] = value.to_le_bytes();
        self.buf[self.pos] = lo;
        self.buf[self.pos + 1] = hi;
        self.pos += 2;
        true
    }

    /// Bytes filled so far
    pub fn filled(&self) -> &[u8] {
        &self.buf[..self.pos]
    }
}
