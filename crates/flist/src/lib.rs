#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `flist` produces the sender's file list. Each command-line source is
//! walked depth-first with `lstat`, every path becomes a
//! [`protocol::flist::FileEntry`], and the combined list is sorted and
//! deduplicated into the canonical order both ends index by.
//!
//! # Naming
//!
//! A source named with a trailing slash transfers the directory's
//! contents: the directory itself travels as `.` and its children under
//! their own names. Without the slash the last component of the source is
//! kept, so `src` yields `src`, `src/a`, `src/b`. Directories named on the
//! command line are flagged as top-level directories, which bounds what a
//! receiver-side delete pass may touch.
//!
//! # Errors
//!
//! Walk failures are per path. [`FileListBuilder::build`] logs them and
//! folds them into the io-error word that follows the list on the wire,
//! keeping [`IO_ERROR_VANISHED`] for files that disappeared mid-walk.
//!
//! # Examples
//!
//! ```
//! use flist::{FileListBuilder, WalkOptions};
//! use std::fs;
//!
//! let temp = tempfile::tempdir().unwrap();
//! let root = temp.path().join("src");
//! fs::create_dir_all(root.join("nested")).unwrap();
//! fs::write(root.join("nested/more.txt"), b"data").unwrap();
//!
//! let options = WalkOptions { recursive: true, ..WalkOptions::default() };
//! let list = FileListBuilder::new(options).source(&root).build();
//! let names: Vec<_> = list.entries.iter().map(|e| e.name.display().to_string()).collect();
//! assert_eq!(names, ["src", "src/nested", "src/nested/more.txt"]);
//! ```

mod builder;
mod entry;
mod error;
mod hlink;
mod walker;

pub use builder::{FileList, FileListBuilder, WalkOptions};
pub use entry::WalkedPath;
pub use error::{FileListError, FileListErrorKind};
pub use hlink::HardLinkGroups;
pub use walker::SourceWalker;

/// io-error bit for failures other than vanished files.
pub const IO_ERROR_GENERAL: i32 = 1 << 0;
/// io-error bit for files that disappeared while the list was built.
pub const IO_ERROR_VANISHED: i32 = 1 << 1;
