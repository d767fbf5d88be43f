//! crates/fast_io/src/mmap.rs
//!
//! Whole-file byte views backed by a shared read-only mapping.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::ops::Deref;
use std::path::Path;

use logging::debug_log;
use memmap2::Mmap;

enum Backing {
    Empty,
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

/// A file's contents as a byte slice.
///
/// The mapping lives as long as the value; dropping it unmaps on every
/// exit path. Empty files are never mapped since `mmap(2)` rejects a zero
/// length.
pub struct MappedFile {
    backing: Backing,
}

impl fmt::Debug for MappedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedFile")
            .field("len", &self.len())
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

impl MappedFile {
    /// Opens `path` and maps it.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Self::map(&file)
    }

    /// Maps the whole of `file` at its current size.
    ///
    /// When the mapping fails the contents are read into memory instead.
    pub fn map(file: &File) -> io::Result<Self> {
        let len = file.metadata()?.len();
        if len == 0 {
            return Ok(Self::empty());
        }
        // SAFETY: the mapping is read-only. A concurrent writer truncating
        // the file would fault the reader, the same exposure every
        // mmap-based reader of a live tree accepts.
        #[allow(unsafe_code)]
        let mapped = unsafe { Mmap::map(file) };
        match mapped {
            Ok(map) => Ok(Self {
                backing: Backing::Mapped(map),
            }),
            Err(err) => {
                debug_log!(Io, 1, "mmap failed ({err}), reading {len} bytes instead");
                Self::read_private(file)
            }
        }
    }

    /// Reads the whole of `file` into a private buffer.
    ///
    /// Used when the file will be overwritten while the view is alive, as
    /// with in-place updates.
    pub fn read_private(file: &File) -> io::Result<Self> {
        let mut file = file;
        let mut data = Vec::new();
        file.seek(SeekFrom::Start(0))?;
        file.read_to_end(&mut data)?;
        file.seek(SeekFrom::Start(0))?;
        if data.is_empty() {
            return Ok(Self::empty());
        }
        Ok(Self {
            backing: Backing::Buffered(data),
        })
    }

    /// A view of nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            backing: Backing::Empty,
        }
    }

    /// The bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        match &self.backing {
            Backing::Empty => &[],
            Backing::Mapped(map) => map,
            Backing::Buffered(data) => data,
        }
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether the view is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the bytes come from a live mapping.
    #[must_use]
    pub const fn is_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped(_))
    }
}

impl Deref for MappedFile {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsRef<[u8]> for MappedFile {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_file_is_not_mapped() {
        let file = tempfile::tempfile().unwrap();
        let view = MappedFile::map(&file).unwrap();
        assert!(view.is_empty());
        assert!(!view.is_mapped());
        assert_eq!(view.as_slice(), b"");
    }

    #[test]
    fn mapping_exposes_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        let view = MappedFile::open(file.path()).unwrap();
        assert!(view.is_mapped());
        assert_eq!(view.len(), data.len());
        assert!(view[..] == data[..]);
    }

    #[test]
    fn private_copy_survives_overwrite() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"original").unwrap();
        let view = MappedFile::read_private(&file).unwrap();

        file.seek(SeekFrom::Start(0)).unwrap();
        file.write_all(b"REPLACED").unwrap();
        assert_eq!(view.as_slice(), b"original");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = MappedFile::open(Path::new("/nonexistent/basis")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
