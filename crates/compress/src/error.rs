//! crates/compress/src/error.rs
//!
//! Error types for the streaming compression contexts.

use std::io;

use thiserror::Error;

use crate::context::StreamState;

/// Errors raised by the deflate/inflate contexts.
#[derive(Debug, Error)]
pub enum CompressError {
    /// The compressor rejected its input.
    #[error("deflate failed: {0}")]
    Deflate(#[from] flate2::CompressError),
    /// The decompressor rejected its input, usually a corrupt stream.
    #[error("inflate failed: {0}")]
    Inflate(#[from] flate2::DecompressError),
    /// An operation was attempted in a state that does not allow it.
    #[error("compression stream is {found:?}, operation requires {expected}")]
    State {
        /// What the operation needed.
        expected: &'static str,
        /// State the context was in.
        found: StreamState,
    },
    /// The inflater made no progress on non-empty input.
    #[error("inflate stalled with {remaining} input bytes left")]
    Stalled {
        /// Bytes that could not be consumed.
        remaining: usize,
    },
    /// A `--compress-level` outside `1..=9`.
    #[error("compression level {0} is outside the supported range 1-9")]
    InvalidLevel(u32),
}

impl From<CompressError> for io::Error {
    fn from(err: CompressError) -> Self {
        Self::new(io::ErrorKind::InvalidData, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_to_invalid_data() {
        let err: io::Error = CompressError::Stalled { remaining: 3 }.into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("3 input bytes"));
    }

    #[test]
    fn state_error_names_both_sides() {
        let err = CompressError::State {
            expected: "an active stream",
            found: StreamState::Init,
        };
        let text = err.to_string();
        assert!(text.contains("Init"));
        assert!(text.contains("an active stream"));
    }
}
