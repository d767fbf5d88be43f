//! crates/transfer/src/receiver/delete.rs
//!
//! `--delete`: removes receiver-side files the sender's list does not
//! name.
//!
//! Only the contents of top-level directories are examined, so files next
//! to a single-file source are never at risk. Directories are emptied
//! depth-first before being removed themselves.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use logging::{debug_log, error_log, info_log, warn_log};
use protocol::flist::{FileEntry, FileKind};

use crate::options::Options;

/// Counts from one delete pass.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct DeleteOutcome {
    /// Entries removed, or that would be under `--dry-run`.
    pub deleted: u64,
    /// Entries left because `--max-delete` was reached.
    pub skipped: u64,
    /// Removals that failed.
    pub errors: u32,
}

/// Deletes everything under each top-level directory of `entries` that
/// the list does not contain.
pub(crate) fn delete_extraneous(
    entries: &[FileEntry],
    options: &Options,
    io_error: i32,
) -> DeleteOutcome {
    let mut pass = DeletePass {
        keep: entries.iter().map(|e| e.name.as_path()).collect(),
        options,
        outcome: DeleteOutcome::default(),
    };
    if io_error != 0 && !options.ignore_errors {
        warn_log!("IO error encountered -- skipping file deletion");
        return pass.outcome;
    }
    for entry in entries {
        if !entry.top_dir || entry.kind() != FileKind::Directory {
            continue;
        }
        debug_log!(Del, 1, "deleting in {}", entry.wpath.display());
        let base = if entry.is_root() { PathBuf::new() } else { entry.name.clone() };
        pass.scan(&entry.wpath, &base);
    }
    pass.outcome
}

struct DeletePass<'a> {
    keep: HashSet<&'a Path>,
    options: &'a Options,
    outcome: DeleteOutcome,
}

impl DeletePass<'_> {
    fn scan(&mut self, local: &Path, name: &Path) {
        let children = match fs::read_dir(local) {
            Ok(children) => children,
            Err(err) => {
                debug_log!(Del, 1, "cannot scan {}: {err}", local.display());
                return;
            }
        };
        let mut names: Vec<_> = children.flatten().map(|child| child.file_name()).collect();
        names.sort();
        for child in names {
            let child_local = local.join(&child);
            let child_name = name.join(&child);
            if self.keep.contains(child_name.as_path()) {
                if child_local.symlink_metadata().is_ok_and(|m| m.is_dir()) {
                    self.scan(&child_local, &child_name);
                }
                continue;
            }
            self.remove(&child_local, &child_name);
        }
    }

    fn remove(&mut self, local: &Path, name: &Path) {
        let is_dir = local.symlink_metadata().is_ok_and(|m| m.is_dir());
        if is_dir {
            if let Ok(children) = fs::read_dir(local) {
                let mut inner: Vec<_> = children.flatten().map(|child| child.file_name()).collect();
                inner.sort();
                for child in inner {
                    self.remove(&local.join(&child), &name.join(&child));
                }
            }
        }
        if self.options.max_delete.is_some_and(|max| self.outcome.deleted >= max) {
            self.outcome.skipped += 1;
            return;
        }
        if is_dir {
            info_log!(Del, 1, "deleting {}/", name.display());
        } else {
            info_log!(Del, 1, "deleting {}", name.display());
        }
        if !self.options.dry_run {
            let result = if is_dir { fs::remove_dir(local) } else { fs::remove_file(local) };
            if let Err(err) = result {
                let call = if is_dir { "rmdir" } else { "unlink" };
                error_log!("delete_file: {call} {}: {err}", local.display());
                self.outcome.errors += 1;
                return;
            }
        }
        self.outcome.deleted += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir_entry(name: &str, wpath: &Path, top: bool) -> FileEntry {
        let mut entry = FileEntry::new(name, 0o040_755);
        entry.wpath = wpath.to_path_buf();
        entry.top_dir = top;
        entry
    }

    fn file_entry(name: &str, wpath: &Path) -> FileEntry {
        let mut entry = FileEntry::new(name, 0o100_644);
        entry.wpath = wpath.to_path_buf();
        entry
    }

    #[test]
    fn only_top_dirs_are_scanned() {
        let dest = tempfile::tempdir().unwrap();
        let src = dest.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("keep"), b"k").unwrap();
        fs::write(src.join("stale"), b"s").unwrap();
        fs::create_dir(src.join("old")).unwrap();
        fs::write(src.join("old/inner"), b"i").unwrap();
        fs::write(dest.path().join("outside"), b"o").unwrap();

        let entries = vec![
            dir_entry("src", &src, true),
            file_entry("src/keep", &src.join("keep")),
        ];
        let outcome = delete_extraneous(&entries, &Options::default(), 0);
        assert_eq!(outcome.deleted, 3);
        assert!(src.join("keep").exists());
        assert!(!src.join("stale").exists());
        assert!(!src.join("old").exists());
        assert!(dest.path().join("outside").exists());
    }

    #[test]
    fn max_delete_stops_removals() {
        let dest = tempfile::tempdir().unwrap();
        for name in ["a", "b", "c"] {
            fs::write(dest.path().join(name), b"x").unwrap();
        }
        let entries = vec![dir_entry(".", dest.path(), true)];
        let options = Options {
            max_delete: Some(1),
            ..Options::default()
        };
        let outcome = delete_extraneous(&entries, &options, 0);
        assert_eq!(outcome.deleted, 1);
        assert_eq!(outcome.skipped, 2);
        assert!(!dest.path().join("a").exists());
        assert!(dest.path().join("c").exists());
    }

    #[test]
    fn sender_io_errors_suppress_deletion() {
        let dest = tempfile::tempdir().unwrap();
        fs::write(dest.path().join("a"), b"x").unwrap();
        let entries = vec![dir_entry(".", dest.path(), true)];
        let outcome = delete_extraneous(&entries, &Options::default(), 1);
        assert_eq!(outcome, DeleteOutcome::default());
        assert!(dest.path().join("a").exists());

        let options = Options {
            ignore_errors: true,
            ..Options::default()
        };
        assert_eq!(delete_extraneous(&entries, &options, 1).deleted, 1);
    }

    #[test]
    fn dry_run_only_reports() {
        let dest = tempfile::tempdir().unwrap();
        fs::write(dest.path().join("a"), b"x").unwrap();
        let entries = vec![dir_entry(".", dest.path(), true)];
        let options = Options {
            dry_run: true,
            ..Options::default()
        };
        assert_eq!(delete_extraneous(&entries, &options, 0).deleted, 1);
        assert!(dest.path().join("a").exists());
    }
}
