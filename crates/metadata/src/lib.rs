#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Receiver-side filesystem collaborators of the transfer engine.
//!
//! - [`set_metadata`] applies a file-list entry's ownership, permissions
//!   and modification time to a file the receiver created or updated.
//! - [`TempFile`] and [`move_file`] stage received data beside its final
//!   location and rename it into place, copying when a rename would cross
//!   filesystems.
//! - [`create_special`] makes device nodes, fifos and sockets.
//! - [`SystemIds`] maps user and group names for the file-list id tables.
//!
//! # Examples
//!
//! ```
//! use metadata::{MetadataOptions, MetadataTarget, set_metadata};
//! use protocol::flist::FileEntry;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let path = dir.path().join("f");
//! std::fs::write(&path, b"data").unwrap();
//!
//! let mut entry = FileEntry::new("f", 0o100_600);
//! entry.mtime = 1_700_000_000;
//! let options = MetadataOptions::new().preserve_permissions(true).preserve_times(true);
//! set_metadata(&entry, MetadataTarget::Path(&path), false, &options).unwrap();
//! ```

mod apply;
mod error;
mod ids;
mod options;
mod placement;
mod special;

pub use apply::{MetadataTarget, set_metadata};
pub use error::MetadataError;
pub use ids::SystemIds;
pub use options::{MetadataOptions, current_umask};
pub use placement::{TempFile, move_file};
pub use special::create_special;
