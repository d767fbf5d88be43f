//! crates/metadata/src/apply.rs
//!
//! Carries a file-list entry's ownership, permissions and modification
//! time over to the file the receiver just created or updated.

use std::fs::{self, File, Metadata};
use std::io;
use std::os::unix::fs::{MetadataExt, PermissionsExt, chown, fchown, lchown};
use std::path::Path;

use filetime::{FileTime, set_file_handle_times, set_file_mtime, set_symlink_file_times};
use logging::debug_log;
use protocol::flist::{FileEntry, FileKind};

use crate::error::MetadataError;
use crate::options::MetadataOptions;

const ALL_PERMS: u32 = 0o7777;

/// What [`set_metadata`] operates on.
#[derive(Clone, Copy, Debug)]
pub enum MetadataTarget<'a> {
    /// An open regular file, still at its temporary name. The path is used
    /// for messages only.
    Open(&'a File, &'a Path),
    /// A path; symbolic links are never followed.
    Path(&'a Path),
}

impl MetadataTarget<'_> {
    fn path(&self) -> &Path {
        match self {
            Self::Open(_, path) | Self::Path(path) => path,
        }
    }

    fn stat(&self) -> io::Result<Metadata> {
        match self {
            Self::Open(file, _) => file.metadata(),
            Self::Path(path) => fs::symlink_metadata(path),
        }
    }
}

/// Applies `entry`'s attributes to `target`.
///
/// Ownership changes only when preserved and different; the owner only
/// for the superuser, and a refused group change is not an error for an
/// unprivileged user. Permissions are set when preserved, and on new files
/// the sender's mode is applied under the configured umask. Symbolic links
/// never get a mode.
pub fn set_metadata(
    entry: &FileEntry,
    target: MetadataTarget<'_>,
    is_new: bool,
    options: &MetadataOptions,
) -> Result<(), MetadataError> {
    let path = target.path();
    let current = target
        .stat()
        .map_err(|err| MetadataError::new("stat", path, err))?;

    set_ownership(entry, &target, &current, options)?;

    if entry.kind() != FileKind::Symlink && (options.permissions() || is_new) {
        let mut mode = entry.permissions() & ALL_PERMS;
        if !options.permissions() {
            mode &= !options.umask();
        }
        if current.mode() & ALL_PERMS != mode {
            debug_log!(Own, 2, "chmod {:o} {}", mode, path.display());
            let perms = fs::Permissions::from_mode(mode);
            let result = match target {
                MetadataTarget::Open(file, _) => file.set_permissions(perms),
                MetadataTarget::Path(path) => fs::set_permissions(path, perms),
            };
            result.map_err(|err| MetadataError::new("set permissions", path, err))?;
        }
    }

    if options.times() {
        let mtime = FileTime::from_unix_time(entry.mtime, 0);
        if FileTime::from_last_modification_time(&current) != mtime {
            let result = match target {
                MetadataTarget::Open(file, _) => set_file_handle_times(file, None, Some(mtime)),
                MetadataTarget::Path(path) if entry.kind() == FileKind::Symlink => {
                    set_symlink_file_times(path, FileTime::now(), mtime)
                }
                MetadataTarget::Path(path) => set_file_mtime(path, mtime),
            };
            result.map_err(|err| MetadataError::new("set times", path, err))?;
        }
    }
    Ok(())
}

fn set_ownership(
    entry: &FileEntry,
    target: &MetadataTarget<'_>,
    current: &Metadata,
    options: &MetadataOptions,
) -> Result<(), MetadataError> {
    let root = rustix::process::geteuid().is_root();
    let uid = (root && options.owner() && current.uid() != entry.uid).then_some(entry.uid);
    let gid = (options.group() && current.gid() != entry.gid).then_some(entry.gid);
    if uid.is_none() && gid.is_none() {
        return Ok(());
    }

    let path = target.path();
    let result = match target {
        MetadataTarget::Open(file, _) => fchown(file, uid, gid),
        MetadataTarget::Path(path) if entry.kind() == FileKind::Symlink => lchown(path, uid, gid),
        MetadataTarget::Path(path) => chown(path, uid, gid),
    };
    match result {
        Ok(()) => {
            debug_log!(Own, 1, "chown {:?}:{:?} {}", uid, gid, path.display());
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied && !root => {
            debug_log!(Own, 1, "cannot change group of {}: {err}", path.display());
            Ok(())
        }
        Err(err) => Err(MetadataError::new("change ownership", path, err)),
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::symlink;

    use super::*;

    fn regular(name: &str, mode: u32, mtime: i64) -> FileEntry {
        let mut entry = FileEntry::new(name, 0o100_000 | mode);
        entry.mtime = mtime;
        entry
    }

    #[test]
    fn preserved_mode_and_time_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"x").unwrap();

        let entry = regular("f", 0o640, 1_234_567_890);
        let options = MetadataOptions::new()
            .preserve_permissions(true)
            .preserve_times(true);
        set_metadata(&entry, MetadataTarget::Path(&path), false, &options).unwrap();

        let meta = fs::metadata(&path).unwrap();
        assert_eq!(meta.mode() & 0o7777, 0o640);
        assert_eq!(meta.mtime(), 1_234_567_890);
    }

    #[test]
    fn new_file_gets_masked_mode_without_perms() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        let file = File::create(&path).unwrap();

        let entry = regular("f", 0o777, 0);
        let options = MetadataOptions::new().with_umask(0o027);
        set_metadata(&entry, MetadataTarget::Open(&file, &path), true, &options).unwrap();
        assert_eq!(file.metadata().unwrap().mode() & 0o777, 0o750);
    }

    #[test]
    fn existing_file_mode_is_left_alone_without_perms() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"x").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

        let entry = regular("f", 0o755, 0);
        set_metadata(&entry, MetadataTarget::Path(&path), false, &MetadataOptions::new()).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().mode() & 0o777, 0o600);
    }

    #[test]
    fn symlink_time_does_not_touch_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        fs::write(&target, b"x").unwrap();
        filetime::set_file_mtime(&target, FileTime::from_unix_time(100, 0)).unwrap();
        let link = dir.path().join("link");
        symlink("target", &link).unwrap();

        let mut entry = FileEntry::new("link", 0o120_777);
        entry.mtime = 5_000;
        let options = MetadataOptions::new().preserve_times(true).preserve_permissions(true);
        set_metadata(&entry, MetadataTarget::Path(&link), false, &options).unwrap();

        assert_eq!(fs::symlink_metadata(&link).unwrap().mtime(), 5_000);
        assert_eq!(fs::metadata(&target).unwrap().mtime(), 100);
    }

    #[test]
    fn own_group_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"x").unwrap();
        let meta = fs::metadata(&path).unwrap();

        let mut entry = regular("f", 0o644, 0);
        entry.uid = meta.uid();
        entry.gid = meta.gid();
        let options = MetadataOptions::new().preserve_owner(true).preserve_group(true);
        set_metadata(&entry, MetadataTarget::Path(&path), false, &options).unwrap();
    }

    #[test]
    fn missing_path_reports_stat() {
        let entry = regular("gone", 0o644, 0);
        let err = set_metadata(
            &entry,
            MetadataTarget::Path(Path::new("/nonexistent/gone")),
            false,
            &MetadataOptions::new(),
        )
        .unwrap_err();
        assert_eq!(err.context(), "stat");
    }
}
