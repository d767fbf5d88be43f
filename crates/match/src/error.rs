//! crates/match/src/error.rs
//!
//! Errors raised while matching blocks or coding the token stream.

use std::io;

use checksums::RollingError;
use compress::CompressError;
use thiserror::Error;

/// Failures of the matcher and the token codecs.
#[derive(Debug, Error)]
pub enum MatchError {
    /// Reading or writing the token stream failed.
    #[error("token stream I/O failed: {0}")]
    Io(#[from] io::Error),
    /// The compressed stream could not be coded.
    #[error(transparent)]
    Compress(#[from] CompressError),
    /// The rolling window was driven past its contents.
    #[error(transparent)]
    Rolling(#[from] RollingError),
    /// A token referenced a block the basis does not have.
    #[error("token references block {index} but the basis has {count} blocks")]
    BlockOutOfRange {
        /// Decoded block index.
        index: i64,
        /// Blocks in the current set.
        count: usize,
    },
    /// A compressed token stream carried a flag byte with no meaning.
    #[error("invalid compressed token flag {0:#04x}")]
    InvalidFlag(u8),
    /// A run of blocks was longer than the stream allows.
    #[error("block run of {0} tokens exceeds the protocol limit")]
    RunTooLong(u32),
}

impl From<MatchError> for io::Error {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::Io(inner) => inner,
            other => Self::new(io::ErrorKind::InvalidData, other),
        }
    }
}
