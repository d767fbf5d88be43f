//! crates/protocol/src/flist/flags.rs
//!
//! Per-entry transmit flags. The low byte is always sent; the high byte
//! follows only when [`XmitFlags::EXTENDED_FLAGS`] is set (protocol 28+).

/// "Same as previous entry" bits that lead every file-list record.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct XmitFlags(u16);

impl XmitFlags {
    /// Entry named on the command line.
    pub const TOP_DIR: u16 = 1 << 0;
    /// Mode equals the previous entry's.
    pub const SAME_MODE: u16 = 1 << 1;
    /// A second flag byte follows (protocol 28+).
    pub const EXTENDED_FLAGS: u16 = 1 << 2;
    /// Uid equals the previous entry's.
    pub const SAME_UID: u16 = 1 << 3;
    /// Gid equals the previous entry's.
    pub const SAME_GID: u16 = 1 << 4;
    /// Name shares a prefix with the previous name.
    pub const SAME_NAME: u16 = 1 << 5;
    /// Suffix length is an int rather than a byte.
    pub const LONG_NAME: u16 = 1 << 6;
    /// Mtime equals the previous entry's.
    pub const SAME_TIME: u16 = 1 << 7;
    /// Device major equals the previous entry's.
    pub const SAME_RDEV_MAJOR: u16 = 1 << 8;
    /// Device and inode follow.
    pub const HAS_IDEV_DATA: u16 = 1 << 9;
    /// Device of the link identity equals the previous one.
    pub const SAME_DEV: u16 = 1 << 10;
    /// Device minor fits in one byte.
    pub const RDEV_MINOR_IS_SMALL: u16 = 1 << 11;

    /// Wraps raw bits.
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Whether `flag` is set.
    #[must_use]
    pub const fn has(self, flag: u16) -> bool {
        self.0 & flag != 0
    }

    /// Sets `flag`.
    pub fn set(&mut self, flag: u16) {
        self.0 |= flag;
    }

    /// Whether any bit above the first byte is set.
    #[must_use]
    pub const fn needs_extended(self) -> bool {
        self.0 & 0xff00 != 0
    }

    /// Whether no bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extended_detection() {
        let mut flags = XmitFlags::default();
        flags.set(XmitFlags::SAME_TIME);
        assert!(!flags.needs_extended());
        flags.set(XmitFlags::SAME_DEV);
        assert!(flags.needs_extended());
        assert!(flags.has(XmitFlags::SAME_TIME));
        assert_eq!(flags.bits(), 0x0480);
    }
}
