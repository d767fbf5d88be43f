//! crates/protocol/src/iobuf.rs
//!
//! Read-ahead buffer shared by the wire reader.

use std::io::{self, Read};

/// Default capacity, matching the largest data chunk.
pub const IOBUF_DEFAULT_CAPACITY: usize = 64 * 1024;

/// A growable read-ahead buffer with peek/consume access.
///
/// Unread bytes live in `data[start..end]`. Consumed space is reclaimed by
/// sliding the unread tail to the front before the next fill, so the buffer
/// behaves like a ring without wrap-around bookkeeping.
#[derive(Debug)]
pub struct IoBuf {
    data: Vec<u8>,
    start: usize,
    end: usize,
}

impl Default for IoBuf {
    fn default() -> Self {
        Self::with_capacity(IOBUF_DEFAULT_CAPACITY)
    }
}

impl IoBuf {
    /// Creates a buffer with `capacity` bytes of initial room.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity.max(16)],
            start: 0,
            end: 0,
        }
    }

    /// Unread bytes.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether no unread bytes remain.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Borrows the unread bytes without consuming them.
    #[must_use]
    #[inline]
    pub fn peek(&self) -> &[u8] {
        &self.data[self.start..self.end]
    }

    /// Marks `n` bytes as read.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds [`len`](Self::len).
    pub fn consume(&mut self, n: usize) {
        assert!(n <= self.len(), "consume past end of iobuf");
        self.start += n;
        if self.start == self.end {
            self.start = 0;
            self.end = 0;
        }
    }

    /// Makes room for at least `additional` more bytes.
    pub fn reserve(&mut self, additional: usize) {
        if self.start > 0 {
            self.data.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        let needed = self.end + additional;
        if needed > self.data.len() {
            self.data.resize(needed.next_power_of_two(), 0);
        }
    }

    /// Performs one `read` from `source` into the free space.
    ///
    /// Returns the byte count, `0` meaning end of stream.
    pub fn fill_from<R: Read + ?Sized>(&mut self, source: &mut R) -> io::Result<usize> {
        if self.end == self.data.len() {
            self.reserve(self.data.len() / 2);
        } else if self.start > 0 && self.end - self.start < self.start {
            self.reserve(0);
        }
        let n = source.read(&mut self.data[self.end..])?;
        self.end += n;
        Ok(n)
    }

    /// Appends bytes directly, e.g. for replaying a recorded stream.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.reserve(bytes.len());
        self.data[self.end..self.end + bytes.len()].copy_from_slice(bytes);
        self.end += bytes.len();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn peek_does_not_consume() {
        let mut buf = IoBuf::with_capacity(16);
        buf.extend_from_slice(b"hello");
        assert_eq!(buf.peek(), b"hello");
        assert_eq!(buf.peek(), b"hello");
        buf.consume(2);
        assert_eq!(buf.peek(), b"llo");
        buf.consume(3);
        assert!(buf.is_empty());
    }

    #[test]
    fn grows_when_full() {
        let mut buf = IoBuf::with_capacity(16);
        let mut source = Cursor::new(vec![7u8; 100]);
        while buf.fill_from(&mut source).unwrap() > 0 {}
        assert_eq!(buf.len(), 100);
        assert!(buf.peek().iter().all(|&b| b == 7));
    }

    #[test]
    fn compacts_consumed_space() {
        let mut buf = IoBuf::with_capacity(16);
        buf.extend_from_slice(&[1; 16]);
        buf.consume(12);
        buf.extend_from_slice(&[2; 8]);
        assert_eq!(buf.peek(), &[1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2]);
    }

    #[test]
    #[should_panic(expected = "consume past end")]
    fn over_consume_panics() {
        let mut buf = IoBuf::default();
        buf.consume(1);
    }
}
