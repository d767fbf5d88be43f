#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Block matching and the delta token stream.
//!
//! The sender scans its copy of a file with [`BlockMatcher`], looking up
//! each window's rolling checksum in a [`BlockHashTable`] built from the
//! receiver's [`signature::BlockSet`]. The resulting [`MatchEvent`]s are
//! written by a [`TokenEncoder`] and read back on the receiver by a
//! [`TokenDecoder`], which reports literal bytes and block references for
//! the downloader to apply.
//!
//! [`FuzzyMatcher`] finds an alternative basis when the destination file
//! does not exist yet.
//!
//! # Examples
//!
//! ```
//! use std::num::NonZeroU8;
//!
//! use matching::{TokenDecoder, TokenEncoder, receive_delta, send_delta};
//! use signature::{SignatureLayoutParams, calculate_signature_layout, generate_block_set};
//!
//! let basis = b"the quick brown fox jumps over the lazy dog".repeat(40);
//! let mut target = basis.clone();
//! target.splice(100..100, b"a small edit".iter().copied());
//!
//! let params = SignatureLayoutParams::new(basis.len() as u64, None, NonZeroU8::new(16).unwrap());
//! let layout = calculate_signature_layout(params).unwrap();
//! let set = generate_block_set(&basis, layout, 7).unwrap();
//!
//! let mut wire = Vec::new();
//! send_delta(&mut wire, &target, &set, 7, &mut TokenEncoder::plain()).unwrap();
//!
//! let mut rebuilt = Vec::new();
//! let (_, verified) = receive_delta(
//!     &mut wire.as_slice(),
//!     &basis,
//!     &set,
//!     7,
//!     &mut TokenDecoder::plain(),
//!     &mut rebuilt,
//! )
//! .unwrap();
//! assert!(verified);
//! assert_eq!(rebuilt, target);
//! ```

mod error;
mod fuzzy;
mod index;
mod matcher;
mod token;

pub use error::MatchError;
pub use fuzzy::{FuzzyMatch, FuzzyMatcher, compute_similarity_score};
pub use index::BlockHashTable;
pub use matcher::{BlockMatcher, MatchEvent, MatchStats};
pub use token::{
    DeflatedDecoder, DeflatedEncoder, MAX_DATA_COUNT, PlainDecoder, PlainEncoder, Token,
    TokenDecoder, TokenEncoder, receive_delta, send_delta,
};
