//! crates/transfer/src/receiver/delayed.rs
//!
//! `--delay-updates`: finished files wait in a `.~tmp~` directory beside
//! their destination and are renamed into place together at phase end.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use logging::{debug_log, error_log};
use metadata::{TempFile, move_file};

use crate::error::{TransferError, TransferResult};

/// Name of the staging directory created next to delayed files.
pub(crate) const STAGING_DIR: &str = ".~tmp~";

/// Files staged for the end-of-phase rename.
#[derive(Debug, Default)]
pub(crate) struct DelayedUpdates {
    staged: Vec<(PathBuf, PathBuf)>,
    dirs: BTreeSet<PathBuf>,
}

impl DelayedUpdates {
    /// Moves a verified temp file into the staging directory for `dest`.
    pub(crate) fn stage(&mut self, temp: TempFile, dest: &Path) -> TransferResult<()> {
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        let dir = parent.join(STAGING_DIR);
        match fs::create_dir(&dir) {
            Ok(()) => {
                debug_log!(Recv, 2, "created {}", dir.display());
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
            Err(err) => return Err(TransferError::io("mkdir", &dir, err)),
        }
        self.dirs.insert(dir.clone());
        let name = dest.file_name().unwrap_or_default();
        let staged = dir.join(name);
        temp.persist(&staged)?;
        self.staged.push((staged, dest.to_path_buf()));
        Ok(())
    }

    /// Renames every staged file into place. Returns how many failed.
    pub(crate) fn apply(&mut self) -> u32 {
        let mut failed = 0;
        for (staged, dest) in self.staged.drain(..) {
            debug_log!(Recv, 2, "delayed rename {} -> {}", staged.display(), dest.display());
            if let Err(err) = move_file(&staged, &dest, true) {
                error_log!("{err}");
                failed += 1;
            }
        }
        failed
    }

    /// Removes the staging directories, which are empty once applied.
    pub(crate) fn cleanup(&mut self) {
        for dir in std::mem::take(&mut self.dirs) {
            if let Err(err) = fs::remove_dir(&dir) {
                debug_log!(Recv, 1, "leaving {}: {err}", dir.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;
    use std::io::Write;

    use super::*;

    #[test]
    fn staged_files_appear_only_after_apply() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.txt");
        let mut temp = TempFile::create_in(dir.path(), OsStr::new("out.txt")).unwrap();
        temp.file_mut().write_all(b"new").unwrap();

        let mut delayed = DelayedUpdates::default();
        delayed.stage(temp, &dest).unwrap();
        assert!(!dest.exists());
        assert!(dir.path().join(STAGING_DIR).join("out.txt").exists());
        assert_eq!(delayed.staged.len(), 1);

        assert_eq!(delayed.apply(), 0);
        assert_eq!(fs::read(&dest).unwrap(), b"new");
        delayed.cleanup();
        assert!(!dir.path().join(STAGING_DIR).exists());
    }
}
