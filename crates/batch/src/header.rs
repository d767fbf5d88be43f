//! crates/batch/src/header.rs
//!
//! Fixed header: option bitmap, protocol version and checksum seed, each a
//! little-endian 32-bit integer.

use std::io::{Read, Write};

use protocol::varint::{read_int, write_int};
use protocol::{PROTOCOL_MIN, PROTOCOL_VERSION, ProtocolVersion};

use crate::error::{BatchError, BatchResult};
use crate::flags::BatchFlags;

/// Everything a replay needs before the recorded stream starts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BatchHeader {
    /// Recorded options.
    pub flags: BatchFlags,
    /// Protocol the stream was recorded at.
    pub protocol: ProtocolVersion,
    /// Checksum seed of the recorded session.
    pub seed: i32,
}

impl BatchHeader {
    /// Writes the header.
    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> BatchResult<()> {
        write_int(writer, self.flags.to_bitmap(self.protocol))?;
        write_int(writer, self.protocol.as_u32() as i32)?;
        write_int(writer, self.seed)?;
        Ok(())
    }

    /// Reads and validates a header.
    pub fn read<R: Read + ?Sized>(reader: &mut R) -> BatchResult<Self> {
        let bits = read_int(reader)?;
        let version = read_int(reader)?;
        let protocol = u32::try_from(version)
            .ok()
            .filter(|&v| v <= PROTOCOL_VERSION)
            .and_then(ProtocolVersion::new)
            .ok_or(BatchError::Incompatible {
                version,
                min: PROTOCOL_MIN,
                max: PROTOCOL_VERSION,
            })?;
        let flags = BatchFlags::from_bitmap(bits, protocol).map_err(|unknown| {
            BatchError::InvalidFormat(format!("unknown option bits {unknown:#x}"))
        })?;
        let seed = read_int(reader)?;
        Ok(Self {
            flags,
            protocol,
            seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let header = BatchHeader {
            flags: BatchFlags {
                recurse: true,
                ..BatchFlags::default()
            },
            protocol: ProtocolVersion::CURRENT,
            seed: 0x0102_0304,
        };
        let mut wire = Vec::new();
        header.write(&mut wire).unwrap();
        assert_eq!(wire, [1, 0, 0, 0, 29, 0, 0, 0, 4, 3, 2, 1]);
        assert_eq!(BatchHeader::read(&mut wire.as_slice()).unwrap(), header);
    }

    #[test]
    fn future_protocol_is_refused() {
        let wire = [0, 0, 0, 0, 31, 0, 0, 0, 0, 0, 0, 0];
        let err = BatchHeader::read(&mut wire.as_slice()).unwrap_err();
        assert!(matches!(err, BatchError::Incompatible { version: 31, .. }));
    }

    #[test]
    fn truncated_header_is_io_error() {
        let err = BatchHeader::read(&mut [1u8, 0].as_slice()).unwrap_err();
        assert!(matches!(err, BatchError::Io(_)));
    }
}
