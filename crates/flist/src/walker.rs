//! crates/flist/src/walker.rs
//!
//! Depth-first walk of one source argument.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use logging::{debug_log, info_log};

use crate::entry::WalkedPath;
use crate::error::{FileListError, FileListErrorKind};

/// Splits a source argument into the path to inspect and the name it
/// travels under.
///
/// A trailing slash (or a bare `.`) transfers a directory's contents, so
/// the directory itself becomes `.`. Otherwise the last component names the
/// entry and everything below it.
pub(crate) fn source_name(source: &Path) -> PathBuf {
    let bytes = source.as_os_str().as_bytes();
    let contents_only = bytes.ends_with(b"/") || bytes == b"." || bytes.ends_with(b"/.");
    match source.file_name() {
        Some(name) if !contents_only => PathBuf::from(name),
        _ => PathBuf::from("."),
    }
}

fn child_name(prefix: &Path, name: &OsString) -> PathBuf {
    if prefix.as_os_str() == "." {
        PathBuf::from(name)
    } else {
        prefix.join(name)
    }
}

/// Iterator over the paths under one source argument.
///
/// The source itself comes first, followed by directory contents in
/// sorted order when recursing. Errors are yielded in place and the walk
/// continues past them.
#[derive(Debug)]
pub struct SourceWalker {
    recursive: bool,
    first: Option<WalkedPath>,
    stack: Vec<DirectoryState>,
    errors: VecDeque<FileListError>,
}

impl SourceWalker {
    /// Starts a walk at `source`.
    ///
    /// Fails when the source itself cannot be inspected. A directory named
    /// without `recursive` yields nothing.
    pub fn new(source: &Path, recursive: bool) -> Result<Self, FileListError> {
        let metadata = fs::symlink_metadata(source)
            .map_err(|err| FileListError::new(FileListErrorKind::Source, source, err))?;
        let name = source_name(source);
        debug_log!(Flist, 1, "walking {:?} as {:?}", source, name);

        let mut walker = Self {
            recursive,
            first: None,
            stack: Vec::new(),
            errors: VecDeque::new(),
        };
        if metadata.is_dir() {
            if !recursive {
                info_log!(Skip, 1, "skipping directory {}", name.display());
                return Ok(walker);
            }
            walker.push_directory(source.to_path_buf(), name.clone());
        }
        walker.first = Some(WalkedPath {
            local: source.to_path_buf(),
            top_dir: metadata.is_dir(),
            name,
            metadata,
        });
        Ok(walker)
    }

    fn push_directory(&mut self, local: PathBuf, name: PathBuf) {
        match DirectoryState::read(local, name, &mut self.errors) {
            Ok(state) => self.stack.push(state),
            Err(err) => self.errors.push_back(err),
        }
    }

    fn prepare(&mut self, local: PathBuf, name: PathBuf) -> Result<WalkedPath, FileListError> {
        debug_log!(Flist, 4, "processing {:?}", name);
        let metadata = fs::symlink_metadata(&local)
            .map_err(|err| FileListError::new(FileListErrorKind::Metadata, &local, err))?;
        if metadata.is_dir() && self.recursive {
            self.push_directory(local.clone(), name.clone());
        }
        Ok(WalkedPath {
            local,
            name,
            metadata,
            top_dir: false,
        })
    }
}

impl Iterator for SourceWalker {
    type Item = Result<WalkedPath, FileListError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(first) = self.first.take() {
            return Some(Ok(first));
        }
        if let Some(err) = self.errors.pop_front() {
            return Some(Err(err));
        }
        loop {
            let state = self.stack.last_mut()?;
            let Some(child) = state.entries.pop_front() else {
                self.stack.pop();
                continue;
            };
            let local = state.local.join(&child);
            let name = child_name(&state.name, &child);
            return Some(self.prepare(local, name));
        }
    }
}

#[derive(Debug)]
struct DirectoryState {
    local: PathBuf,
    name: PathBuf,
    entries: VecDeque<OsString>,
}

impl DirectoryState {
    fn read(
        local: PathBuf,
        name: PathBuf,
        errors: &mut VecDeque<FileListError>,
    ) -> Result<Self, FileListError> {
        let listing = fs::read_dir(&local)
            .map_err(|err| FileListError::new(FileListErrorKind::ReadDir, &local, err))?;
        let mut entries = Vec::new();
        for item in listing {
            match item {
                Ok(item) => entries.push(item.file_name()),
                Err(err) => errors.push_back(FileListError::new(
                    FileListErrorKind::ReadDirEntry,
                    &local,
                    err,
                )),
            }
        }
        entries.sort();
        debug_log!(Flist, 3, "found {} entries in {:?}", entries.len(), local);
        Ok(Self {
            local,
            name,
            entries: entries.into(),
        })
    }
}
