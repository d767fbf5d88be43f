#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Batch capture and replay.
//!
//! A batch records one receiver run so it can be applied again later
//! without the sender. The file holds a fixed [`BatchHeader`] followed by
//! exactly the byte stream the sender wrote to the receiver: file list,
//! block-sum acknowledgements, token streams and statistics.
//!
//! - `--write-batch=FILE` installs a [`BatchWriter`] as the receiver's
//!   read mirror while the transfer runs normally.
//! - `--only-write-batch=FILE` records the same stream without touching the
//!   destination.
//! - `--read-batch=FILE` opens the file with [`open_batch`] and feeds the
//!   stream to a receiver whose outbound writes go nowhere.
//!
//! # Examples
//!
//! ```
//! use std::io::Write;
//!
//! use batch::{BatchFlags, BatchHeader, BatchWriter, open_batch};
//! use protocol::ProtocolVersion;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let path = dir.path().join("changes");
//! let header = BatchHeader {
//!     flags: BatchFlags { recurse: true, ..BatchFlags::default() },
//!     protocol: ProtocolVersion::CURRENT,
//!     seed: 1234,
//! };
//!
//! let mut writer = BatchWriter::create(&path, &header).unwrap();
//! writer.write_all(b"stream bytes").unwrap();
//! writer.finish().unwrap();
//!
//! let (replayed, _stream) = open_batch(&path).unwrap();
//! assert_eq!(replayed.seed, 1234);
//! assert!(replayed.flags.recurse);
//! ```

mod error;
mod flags;
mod header;
mod reader;
pub mod script;
mod writer;

pub use error::{BatchError, BatchResult};
pub use flags::BatchFlags;
pub use header::BatchHeader;
pub use reader::open_batch;
pub use writer::BatchWriter;
