#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Block checksums the receiver sends so the sender can find reusable data.
//!
//! [`calculate_signature_layout`] picks the block length, [`generate_block_set`]
//! checksums a basis file into a [`BlockSet`], and [`write_block_set`] /
//! [`read_block_set`] move it across the connection.
//!
//! # Examples
//!
//! ```
//! use std::num::NonZeroU8;
//! use signature::{SignatureLayoutParams, calculate_signature_layout, generate_block_set};
//!
//! let data = vec![7u8; 1500];
//! let params = SignatureLayoutParams::new(1500, None, NonZeroU8::new(2).unwrap());
//! let layout = calculate_signature_layout(params).unwrap();
//! let set = generate_block_set(&data, layout, 0).unwrap();
//! assert_eq!(set.count(), 3);
//! assert_eq!(set.remainder(), 100);
//! ```

mod block;
mod generation;
mod layout;
mod parallel;
mod wire;

pub use block::{Block, BlockSet};
pub use generation::{SignatureError, generate_block_set, generate_block_set_from_reader};
pub use layout::{
    BLOCK_SIZE, MAX_BLOCK_SIZE, SignatureLayout, SignatureLayoutError, SignatureLayoutParams,
    calculate_signature_layout,
};
pub use parallel::PARALLEL_THRESHOLD;
pub use wire::{SumHead, read_block_set, read_blocks, write_block_set};
