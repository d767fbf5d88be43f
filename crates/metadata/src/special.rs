//! crates/metadata/src/special.rs
//!
//! Device nodes, fifos and sockets.

use std::io;
use std::path::Path;

use protocol::flist::{FileEntry, FileKind};
use rustix::fs::{CWD, Dev, FileType, Mode, mknodat};

use crate::error::MetadataError;

/// Creates the device node, fifo or socket `entry` describes at `path`.
///
/// Devices use the entry's `rdev`; creating them normally needs the
/// superuser.
pub fn create_special(entry: &FileEntry, path: &Path) -> Result<(), MetadataError> {
    let (file_type, context) = match entry.kind() {
        FileKind::CharDevice => (FileType::CharacterDevice, "create device"),
        FileKind::BlockDevice => (FileType::BlockDevice, "create device"),
        FileKind::Fifo => (FileType::Fifo, "create fifo"),
        FileKind::Socket => (FileType::Socket, "create socket"),
        _ => {
            return Err(MetadataError::new(
                "create special file",
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "entry is not a special file"),
            ));
        }
    };
    let mode = Mode::from_bits_truncate((entry.permissions() & 0o7777) as _);
    let dev = if entry.kind().is_device() { entry.rdev as Dev } else { 0 };
    mknodat(CWD, path, file_type, mode, dev)
        .map_err(|err| MetadataError::new(context, path, io::Error::from(err)))
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::FileTypeExt;

    use super::*;

    #[test]
    fn fifo_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipe");
        create_special(&FileEntry::new("pipe", 0o010_644), &path).unwrap();
        assert!(std::fs::symlink_metadata(&path).unwrap().file_type().is_fifo());
    }

    #[test]
    fn regular_entry_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            create_special(&FileEntry::new("f", 0o100_644), &dir.path().join("f")).unwrap_err();
        assert_eq!(err.source_error().kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn existing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipe");
        let entry = FileEntry::new("pipe", 0o010_600);
        create_special(&entry, &path).unwrap();
        let err = create_special(&entry, &path).unwrap_err();
        assert_eq!(err.context(), "create fifo");
    }
}
