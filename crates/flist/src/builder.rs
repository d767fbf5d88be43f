//! crates/flist/src/builder.rs
//!
//! Collects the walks of every source argument into one sorted list.

use std::path::{Path, PathBuf};

use logging::{debug_log, error_log, warn_log};
use protocol::flist::{FileEntry, sort_and_dedup};

use crate::error::FileListError;
use crate::walker::SourceWalker;
use crate::{IO_ERROR_GENERAL, IO_ERROR_VANISHED};

/// What the walk records about each path.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct WalkOptions {
    /// Descend into directories.
    pub recursive: bool,
    /// Record device/inode identity of multiply-linked regular files.
    pub preserve_hard_links: bool,
    /// Compute whole-file digests with this seed.
    pub checksum_seed: Option<i32>,
}

/// A sender's file list and the error word that travels after it.
#[derive(Debug, Default)]
pub struct FileList {
    /// Entries sorted, deduplicated and numbered in transmit order.
    pub entries: Vec<FileEntry>,
    /// [`IO_ERROR_GENERAL`] and [`IO_ERROR_VANISHED`] bits.
    pub io_error: i32,
}

/// Builds the sender's file list from command-line sources.
#[derive(Clone, Debug)]
pub struct FileListBuilder {
    sources: Vec<PathBuf>,
    options: WalkOptions,
}

impl FileListBuilder {
    /// Starts a builder with no sources.
    #[must_use]
    pub const fn new(options: WalkOptions) -> Self {
        Self {
            sources: Vec::new(),
            options,
        }
    }

    /// Adds one source argument.
    #[must_use]
    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(path.into());
        self
    }

    /// Adds several source arguments.
    #[must_use]
    pub fn sources<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.sources
            .extend(paths.into_iter().map(|p| p.as_ref().to_path_buf()));
        self
    }

    /// Walks every source.
    ///
    /// Failures are logged and folded into the io-error word rather than
    /// ending the walk, so the rest of the list still transfers.
    #[must_use]
    pub fn build(&self) -> FileList {
        let mut list = FileList::default();
        for source in &self.sources {
            let walker = match SourceWalker::new(source, self.options.recursive) {
                Ok(walker) => walker,
                Err(err) => {
                    list.note(&err);
                    continue;
                }
            };
            for item in walker {
                match item.and_then(|walked| walked.to_entry(&self.options)) {
                    Ok(entry) => list.entries.push(entry),
                    Err(err) => list.note(&err),
                }
            }
        }

        sort_and_dedup(&mut list.entries);
        for (index, entry) in list.entries.iter_mut().enumerate() {
            entry.send_index = index;
        }
        debug_log!(
            Flist,
            1,
            "built file list: {} entries, io_error {}",
            list.entries.len(),
            list.io_error
        );
        list
    }
}

impl FileList {
    fn note(&mut self, err: &FileListError) {
        if err.is_vanished() {
            warn_log!("file has vanished: {:?}", err.path());
            self.io_error |= IO_ERROR_VANISHED;
        } else {
            error_log!("{err}");
            self.io_error |= IO_ERROR_GENERAL;
        }
    }
}
