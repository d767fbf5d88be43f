//! crates/protocol/src/varint.rs
//!
//! Fixed-width integer and string primitives.
//!
//! All multi-byte integers are little-endian. These helpers work over any
//! [`Read`]/[`Write`], which includes the multiplexed
//! [`WireReader`](crate::WireReader) and [`WireWriter`](crate::WireWriter).

use std::io::{self, Read, Write};

use crate::error::ProtocolError;

/// Longest string [`write_vstring`] can encode.
pub const MAX_VSTRING_LEN: usize = 0x7fff;

/// Writes one byte.
pub fn write_byte<W: Write + ?Sized>(writer: &mut W, value: u8) -> io::Result<()> {
    writer.write_all(&[value])
}

/// Reads one byte.
pub fn read_byte<R: Read + ?Sized>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Writes a 16-bit value.
pub fn write_shortint<W: Write + ?Sized>(writer: &mut W, value: u16) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Reads a 16-bit value.
pub fn read_shortint<R: Read + ?Sized>(reader: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

/// Writes a 32-bit signed value.
pub fn write_int<W: Write + ?Sized>(writer: &mut W, value: i32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Reads a 32-bit signed value.
pub fn read_int<R: Read + ?Sized>(reader: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

/// Reads a 32-bit value that must be non-negative, as a `usize`.
pub fn read_count<R: Read + ?Sized>(reader: &mut R, what: &'static str) -> io::Result<usize> {
    let value = read_int(reader)?;
    usize::try_from(value)
        .map_err(|_| ProtocolError::malformed(what, format!("negative value {value}")).into())
}

/// Writes a 64-bit value as a plain `int` when it lies in `0..=i32::MAX`,
/// otherwise as `-1` followed by the full 64 bits.
pub fn write_longint<W: Write + ?Sized>(writer: &mut W, value: i64) -> io::Result<()> {
    match i32::try_from(value) {
        Ok(small) if small >= 0 => write_int(writer, small),
        _ => {
            write_int(writer, -1)?;
            writer.write_all(&value.to_le_bytes())
        }
    }
}

/// Reads a value written by [`write_longint`].
pub fn read_longint<R: Read + ?Sized>(reader: &mut R) -> io::Result<i64> {
    let first = read_int(reader)?;
    if first != -1 {
        return Ok(i64::from(first));
    }
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

/// Reads exactly `len` bytes into a fresh vector.
pub fn read_bytes<R: Read + ?Sized>(reader: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Writes a length-prefixed string: one length byte below `0x80`, else two
/// big-endian bytes with the top bit set.
pub fn write_vstring<W: Write + ?Sized>(writer: &mut W, value: &[u8]) -> io::Result<()> {
    let len = value.len();
    if len > MAX_VSTRING_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("string of {len} bytes exceeds {MAX_VSTRING_LEN}"),
        ));
    }
    if len < 0x80 {
        write_byte(writer, len as u8)?;
    } else {
        writer.write_all(&[(len >> 8) as u8 | 0x80, len as u8])?;
    }
    writer.write_all(value)
}

/// Reads a string written by [`write_vstring`].
pub fn read_vstring<R: Read + ?Sized>(reader: &mut R) -> io::Result<Vec<u8>> {
    let first = read_byte(reader)?;
    let len = if first & 0x80 == 0 {
        usize::from(first)
    } else {
        (usize::from(first & 0x7f) << 8) | usize::from(read_byte(reader)?)
    };
    read_bytes(reader, len)
}
