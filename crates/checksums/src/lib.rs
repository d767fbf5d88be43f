#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Checksums used by the delta-transfer engine.
//!
//! - [`RollingChecksum`]: the weak, O(1)-per-byte sliding checksum used to
//!   find candidate block matches.
//! - [`block_digest`]: seeded MD4 over one block, truncated to the
//!   negotiated checksum length before it goes on the wire.
//! - [`FileDigest`]: seeded MD4 over a whole file, used to verify the
//!   reconstructed result.
//!
//! # Examples
//!
//! ```
//! use checksums::{RollingChecksum, hash_fast};
//!
//! let data = b"0123456789";
//! let mut window = RollingChecksum::from_block(&data[..4]);
//! window.roll(data[0], data[4]).unwrap();
//! assert_eq!(window.value(), hash_fast(&data[1..5]));
//! ```

mod rolling;
pub mod strong;

pub use rolling::{RollingChecksum, RollingDigest, RollingError, hash_fast};
pub use strong::{
    CSUM_LENGTH_PHASE1, CSUM_LENGTH_PHASE2, FileDigest, MD4_DIGEST_LEN, Md4, block_digest,
    file_digest,
};
