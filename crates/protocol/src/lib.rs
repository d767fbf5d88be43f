#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Wire protocol primitives for the delta-transfer engine.
//!
//! The crate covers everything that crosses the connection except the
//! token stream itself:
//!
//! - [`varint`]: little-endian integers, the `longint` escape form and
//!   length-prefixed strings.
//! - [`multiplex`]: [`WireReader`] and [`WireWriter`], which buffer one
//!   direction of the connection and optionally frame it into `MSG_DATA`
//!   and out-of-band messages ([`envelope`]).
//! - [`poll`]: readiness helpers over borrowed descriptors.
//! - [`handshake`] and [`legacy`]: version negotiation over pipes and the
//!   `@RSYNCD:` daemon preamble.
//! - [`flist`]: the file-list record codec.
//! - [`ItemFlags`] / [`FileRequest`] and [`TransferStats`].
//!
//! # Examples
//!
//! ```
//! use protocol::varint::{read_longint, write_longint};
//!
//! let mut wire = Vec::new();
//! write_longint(&mut wire, 1 << 40).unwrap();
//! assert_eq!(wire.len(), 12);
//! assert_eq!(read_longint(&mut wire.as_slice()).unwrap(), 1 << 40);
//! ```

pub mod envelope;
mod error;
pub mod flist;
pub mod handshake;
mod iobuf;
mod itemize;
pub mod legacy;
pub mod multiplex;
pub mod poll;
mod stats;
pub mod varint;
mod version;

pub use envelope::{EnvelopeError, MessageCode, MessageHeader};
pub use error::ProtocolError;
pub use handshake::{Handshake, client_handshake, exchange_versions, server_handshake};
pub use iobuf::{IOBUF_DEFAULT_CAPACITY, IoBuf};
pub use itemize::{FileRequest, ItemFlags};
pub use multiplex::{ControlMessage, MAX_CHUNK, OutOfBand, WireReader, WireWriter, WriteMode};
pub use stats::TransferStats;
pub use version::{PROTOCOL_MIN, PROTOCOL_VERSION, ProtocolVersion};
