#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! Streaming raw-deflate contexts used by the compressed token stream.
//!
//! Both peers keep one long-lived codec per connection. Literal data is
//! compressed with a sync flush so each chunk can be decoded on arrival,
//! and the trailing `00 00 ff ff` marker is stripped on the wire. Data the
//! receiver already has (matched blocks) is inserted into the history
//! window on both sides so later literals can reference it.
//!
//! # Invariants
//!
//! - Every operation checks the [`StreamState`] first; misuse returns
//!   [`CompressError::State`] rather than corrupting the stream.
//! - Inserts are split into runs of at most [`MAX_INSERT_CHUNK`] bytes, and
//!   both contexts take the protocol version so they split identically.
//!
//! # Examples
//!
//! ```
//! use compress::{CompressionLevel, DeflateContext, InflateContext};
//!
//! # fn main() -> Result<(), compress::CompressError> {
//! let mut tx = DeflateContext::new(CompressionLevel::Default, 31);
//! let mut rx = InflateContext::new(31);
//! tx.begin()?;
//! rx.begin()?;
//!
//! let mut wire = Vec::new();
//! tx.deflate(b"payload", &mut wire)?;
//! let mut plain = Vec::new();
//! rx.inflate(&wire, &mut plain)?;
//! assert_eq!(plain, b"payload");
//! # Ok(())
//! # }
//! ```

mod context;
mod error;
mod level;

pub use context::{
    DeflateContext, InflateContext, MAX_INSERT_CHUNK, SYNC_MARKER, StreamState,
};
pub use error::CompressError;
pub use level::CompressionLevel;
