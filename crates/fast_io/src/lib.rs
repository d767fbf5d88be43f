//! Read-only file views and whole-file copies.
//!
//! The delta engine reads basis and source files as plain byte slices.
//! [`MappedFile`] provides that view through `mmap(2)`, treating empty
//! files without a mapping and falling back to a buffered read when the
//! filesystem refuses to map. [`copy_file_contents`] copies between two
//! open files, preferring `copy_file_range(2)` for large files.
//!
//! # Examples
//!
//! ```
//! use std::io::Write;
//!
//! let mut file = tempfile::tempfile().unwrap();
//! file.write_all(b"basis").unwrap();
//! let view = fast_io::MappedFile::map(&file).unwrap();
//! assert_eq!(view.as_slice(), b"basis");
//! ```

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]

pub mod copy_file_range;
mod mmap;

pub use copy_file_range::copy_file_contents;
pub use mmap::MappedFile;
