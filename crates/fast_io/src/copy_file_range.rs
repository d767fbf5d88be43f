//! crates/fast_io/src/copy_file_range.rs
//!
//! File-to-file copies for cross-device moves and `--copy-dest`.
//!
//! On Linux, copies of at least [`COPY_FILE_RANGE_THRESHOLD`] bytes try
//! `copy_file_range(2)` first so the kernel moves the data without a
//! round trip through user space. Smaller copies, other platforms and any
//! syscall failure use a plain read/write loop. Both paths advance the
//! descriptors' file positions.

use std::fs::File;
use std::io::{self, Read, Write};

use logging::debug_log;

/// Copies below this size go straight to the read/write loop.
pub const COPY_FILE_RANGE_THRESHOLD: u64 = 64 * 1024;

const FALLBACK_BUFFER: usize = 256 * 1024;

/// Copies up to `length` bytes from `source` to `destination`, starting at
/// their current positions. Returns the number copied, which is short only
/// when `source` reaches end of file.
pub fn copy_file_contents(source: &File, destination: &File, length: u64) -> io::Result<u64> {
    if length >= COPY_FILE_RANGE_THRESHOLD {
        match try_copy_file_range(source, destination, length) {
            Ok(copied) => return Ok(copied),
            Err((0, err)) => {
                debug_log!(Io, 2, "copy_file_range unavailable ({err}), using read/write");
            }
            Err((copied, err)) => {
                debug_log!(Io, 2, "copy_file_range stopped after {copied} bytes: {err}");
                return Ok(copied + copy_readwrite(source, destination, length - copied)?);
            }
        }
    }
    copy_readwrite(source, destination, length)
}

#[cfg(target_os = "linux")]
fn try_copy_file_range(
    source: &File,
    destination: &File,
    length: u64,
) -> Result<u64, (u64, io::Error)> {
    let mut copied = 0u64;
    while copied < length {
        let chunk = usize::try_from(length - copied).unwrap_or(usize::MAX).min(1 << 30);
        match rustix::fs::copy_file_range(source, None, destination, None, chunk) {
            Ok(0) => break,
            Ok(n) => copied += n as u64,
            Err(rustix::io::Errno::INTR) => {}
            Err(err) => return Err((copied, err.into())),
        }
    }
    Ok(copied)
}

#[cfg(not(target_os = "linux"))]
fn try_copy_file_range(
    _source: &File,
    _destination: &File,
    _length: u64,
) -> Result<u64, (u64, io::Error)> {
    Err((
        0,
        io::Error::new(
            io::ErrorKind::Unsupported,
            "copy_file_range not available on this platform",
        ),
    ))
}

fn copy_readwrite(source: &File, destination: &File, length: u64) -> io::Result<u64> {
    let mut reader = source;
    let mut writer = destination;
    let mut buf = vec![0u8; FALLBACK_BUFFER];
    let mut total = 0u64;

    while total < length {
        let want = usize::try_from(length - total).unwrap_or(usize::MAX).min(buf.len());
        let n = match reader.read(&mut buf[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
    Ok(total)
}
