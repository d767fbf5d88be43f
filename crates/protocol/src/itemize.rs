//! crates/protocol/src/itemize.rs
//!
//! Itemization flags and the per-file request header that carries them.

use std::io::{self, Read, Write};

use crate::varint::{
    read_byte, read_int, read_shortint, read_vstring, write_byte, write_int, write_shortint,
    write_vstring,
};
use crate::version::ProtocolVersion;

/// Per-file itemization word exchanged on protocol 29 and later.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct ItemFlags(u16);

impl ItemFlags {
    /// Access time changed.
    pub const REPORT_ATIME: u16 = 1 << 0;
    /// Content or type changed.
    pub const REPORT_CHANGE: u16 = 1 << 1;
    /// Size changed.
    pub const REPORT_SIZE: u16 = 1 << 2;
    /// Modification time changed.
    pub const REPORT_TIME: u16 = 1 << 3;
    /// Permissions changed.
    pub const REPORT_PERMS: u16 = 1 << 4;
    /// Owner changed.
    pub const REPORT_OWNER: u16 = 1 << 5;
    /// Group changed.
    pub const REPORT_GROUP: u16 = 1 << 6;
    /// A basis-directory selector byte follows.
    pub const BASIS_TYPE_FOLLOWS: u16 = 1 << 11;
    /// A hard-link or alternate name follows.
    pub const XNAME_FOLLOWS: u16 = 1 << 12;
    /// The entry does not exist on the receiver yet.
    pub const IS_NEW: u16 = 1 << 13;
    /// Change made locally without sender data.
    pub const LOCAL_CHANGE: u16 = 1 << 14;
    /// File data is being requested.
    pub const TRANSFER: u16 = 1 << 15;

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

    /// Clears `flag`.
    pub fn clear(&mut self, flag: u16) {
        self.0 &= !flag;
    }
}

/// The header the receiver sends to request a file, echoed back by the
/// sender in front of its token stream.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FileRequest {
    /// Sender-side file index.
    pub index: i32,
    /// Itemization bits; absent before protocol 29.
    pub iflags: ItemFlags,
    /// Basis selector when [`ItemFlags::BASIS_TYPE_FOLLOWS`] is set.
    pub basis: Option<u8>,
    /// Extra name when [`ItemFlags::XNAME_FOLLOWS`] is set.
    pub xname: Option<Vec<u8>>,
}

impl FileRequest {
    /// Request for file `index` with data transfer.
    #[must_use]
    pub fn transfer(index: i32) -> Self {
        Self {
            index,
            iflags: ItemFlags::from_bits(ItemFlags::TRANSFER),
            ..Self::default()
        }
    }

    /// Writes the header. Optional parts are only sent when the protocol
    /// carries item flags.
    pub fn write<W: Write + ?Sized>(
        &self,
        writer: &mut W,
        protocol: ProtocolVersion,
    ) -> io::Result<()> {
        write_int(writer, self.index)?;
        if !protocol.has_item_flags() {
            return Ok(());
        }
        let mut iflags = self.iflags;
        if self.basis.is_some() {
            iflags.set(ItemFlags::BASIS_TYPE_FOLLOWS);
        }
        if self.xname.is_some() {
            iflags.set(ItemFlags::XNAME_FOLLOWS);
        }
        write_shortint(writer, iflags.bits())?;
        if let Some(basis) = self.basis {
            write_byte(writer, basis)?;
        }
        if let Some(xname) = &self.xname {
            write_vstring(writer, xname)?;
        }
        Ok(())
    }

    /// Reads the remainder of a header whose index was already read.
    ///
    /// Before protocol 29 every request implies a transfer.
    pub fn read_after_index<R: Read + ?Sized>(
        reader: &mut R,
        index: i32,
        protocol: ProtocolVersion,
    ) -> io::Result<Self> {
        if !protocol.has_item_flags() {
            return Ok(Self::transfer(index));
        }
        let iflags = ItemFlags::from_bits(read_shortint(reader)?);
        let basis = if iflags.has(ItemFlags::BASIS_TYPE_FOLLOWS) {
            Some(read_byte(reader)?)
        } else {
            None
        };
        let xname = if iflags.has(ItemFlags::XNAME_FOLLOWS) {
            Some(read_vstring(reader)?)
        } else {
            None
        };
        Ok(Self {
            index,
            iflags,
            basis,
            xname,
        })
    }

    /// Reads a full header.
    pub fn read<R: Read + ?Sized>(reader: &mut R, protocol: ProtocolVersion) -> io::Result<Self> {
        let index = read_int(reader)?;
        Self::read_after_index(reader, index, protocol)
    }
}
