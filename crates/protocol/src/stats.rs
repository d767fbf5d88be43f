//! crates/protocol/src/stats.rs
//!
//! End-of-run totals sent from the server sender to the client.

use std::io::{self, Read, Write};

use crate::varint::{read_longint, write_longint};

/// Totals reported by the sender when a transfer ends.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransferStats {
    /// Bytes the sender read from the wire.
    pub total_read: u64,
    /// Bytes the sender wrote to the wire.
    pub total_written: u64,
    /// Sum of file sizes in the list.
    pub total_size: u64,
}

impl TransferStats {
    /// Writes the three totals as longints.
    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        write_longint(writer, self.total_read as i64)?;
        write_longint(writer, self.total_written as i64)?;
        write_longint(writer, self.total_size as i64)
    }

    /// Reads totals written by [`TransferStats::write`].
    pub fn read<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            total_read: read_longint(reader)? as u64,
            total_written: read_longint(reader)? as u64,
            total_size: read_longint(reader)? as u64,
        })
    }

    /// Ratio of file data to wire bytes, as rsync prints it.
    #[must_use]
    pub fn speedup(&self) -> f64 {
        let wire = self.total_read + self.total_written;
        if wire == 0 {
            0.0
        } else {
            self.total_size as f64 / wire as f64
        }
    }
}
