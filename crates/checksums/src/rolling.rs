//! crates/checksums/src/rolling.rs
//!
//! The rsync weak checksum.
//!
//! Bytes are summed as *signed* 8-bit values, which is what the deployed
//! protocol computes (`schar` in the C sources). Two running sums are kept:
//! `s1 = Σ x_i` and `s2 = Σ (L - i) · x_i` over a window of length `L`. The
//! packed value is `(s1 & 0xffff) | (s2 << 16)`. All arithmetic wraps at 32
//! bits so that the window can slide in O(1) per byte.

use std::fmt;

/// Errors raised by invalid rolling updates.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RollingError {
    /// The window is empty, so nothing can be removed from it.
    EmptyWindow,
}

impl fmt::Display for RollingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyWindow => f.write_str("rolling checksum window is empty"),
        }
    }
}

impl std::error::Error for RollingError {}

#[inline(always)]
const fn signed(byte: u8) -> u32 {
    byte as i8 as i32 as u32
}

/// Incremental rolling checksum over a sliding window.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RollingChecksum {
    s1: u32,
    s2: u32,
    len: usize,
}

impl RollingChecksum {
    /// Creates an empty checksum.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            s1: 0,
            s2: 0,
            len: 0,
        }
    }

    /// Computes the checksum of `data` from scratch.
    #[must_use]
    pub fn from_block(data: &[u8]) -> Self {
        let mut sum = Self::new();
        sum.update(data);
        sum
    }

    /// Clears all state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Appends `data` to the window.
    pub fn update(&mut self, data: &[u8]) {
        let mut s1 = self.s1;
        let mut s2 = self.s2;

        let mut chunks = data.chunks_exact(4);
        for chunk in &mut chunks {
            s1 = s1.wrapping_add(signed(chunk[0]));
            s2 = s2.wrapping_add(s1);
            s1 = s1.wrapping_add(signed(chunk[1]));
            s2 = s2.wrapping_add(s1);
            s1 = s1.wrapping_add(signed(chunk[2]));
            s2 = s2.wrapping_add(s1);
            s1 = s1.wrapping_add(signed(chunk[3]));
            s2 = s2.wrapping_add(s1);
        }
        for &byte in chunks.remainder() {
            s1 = s1.wrapping_add(signed(byte));
            s2 = s2.wrapping_add(s1);
        }

        self.s1 = s1;
        self.s2 = s2;
        self.len += data.len();
    }

    /// Slides the window one byte: drops `outgoing`, appends `incoming`.
    pub fn roll(&mut self, outgoing: u8, incoming: u8) -> Result<(), RollingError> {
        if self.len == 0 {
            return Err(RollingError::EmptyWindow);
        }
        let out = signed(outgoing);
        self.s1 = self.s1.wrapping_sub(out).wrapping_add(signed(incoming));
        self.s2 = self
            .s2
            .wrapping_sub((self.len as u32).wrapping_mul(out))
            .wrapping_add(self.s1);
        Ok(())
    }

    /// Drops `outgoing` from the front of the window without appending.
    ///
    /// Used at end of file where the window shrinks towards the tail.
    pub fn roll_out(&mut self, outgoing: u8) -> Result<(), RollingError> {
        if self.len == 0 {
            return Err(RollingError::EmptyWindow);
        }
        let out = signed(outgoing);
        self.s1 = self.s1.wrapping_sub(out);
        self.s2 = self.s2.wrapping_sub((self.len as u32).wrapping_mul(out));
        self.len -= 1;
        Ok(())
    }

    /// Number of bytes currently in the window.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Reports whether the window is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Packed 32-bit checksum as carried on the wire.
    #[inline]
    #[must_use]
    pub const fn value(&self) -> u32 {
        (self.s1 & 0xffff) | (self.s2 << 16)
    }

    /// Snapshot of the current state.
    #[inline]
    #[must_use]
    pub const fn digest(&self) -> RollingDigest {
        RollingDigest {
            value: self.value(),
            len: self.len,
        }
    }
}

/// Packed rolling checksum together with the length it covers.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct RollingDigest {
    value: u32,
    len: usize,
}

impl RollingDigest {
    /// Builds a digest from a wire value and the block length it describes.
    #[must_use]
    pub const fn new(value: u32, len: usize) -> Self {
        Self { value, len }
    }

    /// Computes the digest of `data`.
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Self {
        RollingChecksum::from_block(data).digest()
    }

    /// Packed 32-bit value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u32 {
        self.value
    }

    /// Number of bytes summed.
    #[inline]
    #[must_use]
    pub const fn len(self) -> usize {
        self.len
    }

    /// Reports whether no bytes were summed.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }
}

/// Convenience for the one-shot weak checksum of `data`.
#[must_use]
pub fn hash_fast(data: &[u8]) -> u32 {
    RollingChecksum::from_block(data).value()
}
