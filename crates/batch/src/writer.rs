//! crates/batch/src/writer.rs
//!
//! Captures a receiver's inbound stream into a batch file.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use logging::debug_log;

use crate::error::{BatchError, BatchResult};
use crate::header::BatchHeader;

/// A batch file being written.
///
/// The header goes out on creation; afterwards every byte written is part
/// of the recorded stream. Install it as the receiver's read mirror and
/// call [`BatchWriter::finish`] once the session ends.
#[derive(Debug)]
pub struct BatchWriter {
    path: PathBuf,
    out: BufWriter<File>,
    recorded: u64,
}

impl BatchWriter {
    /// Creates (or truncates) `path` and writes `header`.
    pub fn create(path: &Path, header: &BatchHeader) -> BatchResult<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|err| BatchError::file(path, err))?;
        let mut out = BufWriter::new(file);
        header.write(&mut out)?;
        debug_log!(
            Io,
            1,
            "writing batch {} at protocol {}",
            path.display(),
            header.protocol.as_u32()
        );
        Ok(Self {
            path: path.to_path_buf(),
            out,
            recorded: 0,
        })
    }

    /// Batch file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stream bytes recorded so far, header excluded.
    #[must_use]
    pub const fn recorded(&self) -> u64 {
        self.recorded
    }

    /// Flushes everything to disk.
    pub fn finish(mut self) -> BatchResult<()> {
        self.out.flush()?;
        self.out
            .get_ref()
            .sync_all()
            .map_err(|err| BatchError::file(&self.path, err))?;
        debug_log!(Io, 1, "batch {} complete, {} bytes", self.path.display(), self.recorded);
        Ok(())
    }
}

impl Write for BatchWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.out.write(buf)?;
        self.recorded += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use protocol::ProtocolVersion;

    use super::*;
    use crate::flags::BatchFlags;

    #[test]
    fn header_then_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b");
        let header = BatchHeader {
            flags: BatchFlags::default(),
            protocol: ProtocolVersion::CURRENT,
            seed: 7,
        };
        let mut writer = BatchWriter::create(&path, &header).unwrap();
        writer.write_all(b"stream").unwrap();
        assert_eq!(writer.recorded(), 6);
        writer.finish().unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 12 + 6);
        assert_eq!(&bytes[12..], b"stream");
    }

    #[test]
    fn unwritable_location_names_path() {
        let header = BatchHeader {
            flags: BatchFlags::default(),
            protocol: ProtocolVersion::CURRENT,
            seed: 0,
        };
        let err = BatchWriter::create(Path::new("/nonexistent/dir/b"), &header).unwrap_err();
        assert!(matches!(err, BatchError::File { .. }));
    }
}
