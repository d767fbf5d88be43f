//! crates/metadata/src/placement.rs
//!
//! Temporary files and the moves that put them in place.
//!
//! Received data is written to a uniquely named file beside its final
//! location and renamed over the destination once verified, so readers
//! never observe a half-written file. [`move_file`] falls back to a copy
//! when the rename would cross filesystems.

use std::ffi::{OsStr, OsString};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt, symlink};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU32, Ordering};

use fast_io::copy_file_contents;
use filetime::{FileTime, set_file_handle_times};
use logging::debug_log;

use crate::error::MetadataError;

static NEXT_TEMP: AtomicU32 = AtomicU32::new(0);

/// Longest file name component kept in a temporary name.
const MAX_TEMP_STEM: usize = 200;

/// Builds `.<name>.<suffix>` for the given attempt.
fn temp_name(name: &OsStr, attempt: u32) -> OsString {
    let bytes = name.as_bytes();
    let stem = &bytes[..bytes.len().min(MAX_TEMP_STEM)];
    let mixed = process::id().wrapping_mul(0x9e37_79b9) ^ attempt.wrapping_mul(0x85eb_ca6b);
    let mut out = OsString::from(".");
    out.push(OsStr::from_bytes(stem));
    out.push(format!(".{:06x}", mixed & 0xff_ffff));
    out
}

/// A file at a temporary name that is removed on drop unless it was
/// persisted or deliberately kept.
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
    file: File,
    done: bool,
}

impl TempFile {
    /// Creates an empty file named after `name` inside `dir`, mode `0600`.
    pub fn create_in(dir: &Path, name: &OsStr) -> Result<Self, MetadataError> {
        loop {
            let attempt = NEXT_TEMP.fetch_add(1, Ordering::Relaxed);
            let path = dir.join(temp_name(name, attempt));
            let opened = OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .mode(0o600)
                .open(&path);
            match opened {
                Ok(file) => {
                    debug_log!(Recv, 2, "created temporary {}", path.display());
                    return Ok(Self {
                        path,
                        file,
                        done: false,
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
                Err(err) => return Err(MetadataError::new("create temporary file", &path, err)),
            }
        }
    }

    /// The open file.
    #[must_use]
    pub const fn file(&self) -> &File {
        &self.file
    }

    /// The open file, mutably.
    pub const fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    /// Current location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Moves the file to `to`, replacing whatever is there.
    pub fn persist(mut self, to: &Path) -> Result<(), MetadataError> {
        move_file(&self.path, to, true)?;
        self.done = true;
        Ok(())
    }

    /// Leaves the file where it is and returns its path.
    #[must_use]
    pub fn keep(mut self) -> PathBuf {
        self.done = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.done {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Moves `from` to `to`.
///
/// Without `replace` an existing `to` is an error. A rename across
/// filesystems is redone as a copy into a temporary file beside `to`,
/// carrying permissions and modification time, followed by removal of
/// `from`.
pub fn move_file(from: &Path, to: &Path, replace: bool) -> Result<(), MetadataError> {
    if !replace && fs::symlink_metadata(to).is_ok() {
        return Err(MetadataError::new(
            "move into place",
            to,
            io::Error::from(io::ErrorKind::AlreadyExists),
        ));
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            debug_log!(Recv, 1, "{} crosses devices, copying", to.display());
            copy_across(from, to)?;
            fs::remove_file(from).map_err(|err| MetadataError::new("remove moved file", from, err))
        }
        Err(err) => Err(MetadataError::new("rename", from, err)),
    }
}

fn copy_across(from: &Path, to: &Path) -> Result<(), MetadataError> {
    let meta = fs::symlink_metadata(from).map_err(|err| MetadataError::new("stat", from, err))?;
    let dir = to.parent().unwrap_or_else(|| Path::new("."));
    let name = to.file_name().unwrap_or_else(|| OsStr::new("moved"));

    if meta.file_type().is_symlink() {
        let target = fs::read_link(from).map_err(|err| MetadataError::new("read link", from, err))?;
        let temp = dir.join(temp_name(name, NEXT_TEMP.fetch_add(1, Ordering::Relaxed)));
        symlink(&target, &temp).map_err(|err| MetadataError::new("create symlink", &temp, err))?;
        return fs::rename(&temp, to).map_err(|err| {
            let _ = fs::remove_file(&temp);
            MetadataError::new("rename", &temp, err)
        });
    }

    let source = File::open(from).map_err(|err| MetadataError::new("open", from, err))?;
    let temp = TempFile::create_in(dir, name)?;
    copy_file_contents(&source, temp.file(), meta.len())
        .map_err(|err| MetadataError::new("copy", temp.path(), err))?;
    temp.file()
        .set_permissions(fs::Permissions::from_mode(meta.permissions().mode()))
        .map_err(|err| MetadataError::new("set permissions", temp.path(), err))?;
    set_file_handle_times(temp.file(), None, Some(FileTime::from_last_modification_time(&meta)))
        .map_err(|err| MetadataError::new("set times", temp.path(), err))?;
    temp.persist(to)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn temp_names_are_hidden_and_distinct() {
        let a = temp_name(OsStr::new("file.txt"), 1);
        let b = temp_name(OsStr::new("file.txt"), 2);
        assert!(a.as_bytes().starts_with(b".file.txt."));
        assert_ne!(a, b);
        let long = "x".repeat(400);
        assert!(temp_name(OsStr::new(&long), 0).len() < 220);
    }

    #[test]
    fn dropped_temp_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let mut temp = TempFile::create_in(dir.path(), OsStr::new("f")).unwrap();
            temp.file_mut().write_all(b"partial").unwrap();
            temp.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn persist_replaces_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("f");
        fs::write(&dest, b"old").unwrap();
        let mut temp = TempFile::create_in(dir.path(), OsStr::new("f")).unwrap();
        temp.file_mut().write_all(b"new").unwrap();
        temp.persist(&dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"new");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn kept_temp_file_survives() {
        let dir = tempfile::tempdir().unwrap();
        let temp = TempFile::create_in(dir.path(), OsStr::new("f")).unwrap();
        let path = temp.keep();
        assert!(path.exists());
    }

    #[test]
    fn move_without_replace_refuses_existing() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("a");
        let to = dir.path().join("b");
        fs::write(&from, b"a").unwrap();
        fs::write(&to, b"b").unwrap();
        let err = move_file(&from, &to, false).unwrap_err();
        assert_eq!(err.source_error().kind(), io::ErrorKind::AlreadyExists);
        move_file(&from, &to, true).unwrap();
        assert_eq!(fs::read(&to).unwrap(), b"a");
        assert!(!from.exists());
    }

    #[test]
    fn copy_across_preserves_mode_and_time() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        let from = src_dir.path().join("data");
        fs::write(&from, vec![9u8; 100_000]).unwrap();
        fs::set_permissions(&from, fs::Permissions::from_mode(0o640)).unwrap();
        filetime::set_file_mtime(&from, FileTime::from_unix_time(1_000_000, 0)).unwrap();

        let to = dst_dir.path().join("data");
        copy_across(&from, &to).unwrap();
        let meta = fs::metadata(&to).unwrap();
        assert_eq!(meta.len(), 100_000);
        assert_eq!(meta.permissions().mode() & 0o777, 0o640);
        assert_eq!(FileTime::from_last_modification_time(&meta).unix_seconds(), 1_000_000);
    }

    #[test]
    fn copy_across_recreates_symlinks() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        let from = src_dir.path().join("link");
        symlink("some/target", &from).unwrap();
        let to = dst_dir.path().join("link");
        copy_across(&from, &to).unwrap();
        assert_eq!(fs::read_link(&to).unwrap(), Path::new("some/target"));
    }
}
