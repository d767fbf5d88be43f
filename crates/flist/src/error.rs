//! crates/flist/src/error.rs
//!
//! Failures met while walking source paths.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// What the walker was doing when it failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileListErrorKind {
    /// Inspecting a source named on the command line.
    Source,
    /// Opening a directory for listing.
    ReadDir,
    /// Advancing through a directory listing.
    ReadDirEntry,
    /// Inspecting an entry found inside a directory.
    Metadata,
    /// Reading a symbolic link's target.
    ReadLink,
    /// Reading file contents for a whole-file digest.
    Checksum,
}

impl FileListErrorKind {
    const fn describe(self) -> &'static str {
        match self {
            Self::Source => "link_stat",
            Self::ReadDir => "opendir",
            Self::ReadDirEntry => "readdir",
            Self::Metadata => "stat",
            Self::ReadLink => "readlink",
            Self::Checksum => "checksum",
        }
    }
}

/// A walk failure with the path it concerns.
///
/// Failures are per entry: the walk carries on past them and the sender
/// reports them to the receiver through the file list's io-error word.
#[derive(Debug, Error)]
#[error("{} {:?} failed: {source}", kind.describe(), path)]
pub struct FileListError {
    kind: FileListErrorKind,
    path: PathBuf,
    #[source]
    source: io::Error,
}

impl FileListError {
    pub(crate) fn new(
        kind: FileListErrorKind,
        path: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            source,
        }
    }

    /// The step that failed.
    #[must_use]
    pub const fn kind(&self) -> FileListErrorKind {
        self.kind
    }

    /// The path the step concerned.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the path disappeared while the list was being built.
    #[must_use]
    pub fn is_vanished(&self) -> bool {
        self.source.kind() == io::ErrorKind::NotFound && self.kind != FileListErrorKind::Source
    }
}
