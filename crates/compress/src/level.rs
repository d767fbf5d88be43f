//! crates/compress/src/level.rs
//!
//! Compression levels accepted by `--compress-level`.

use std::num::NonZeroU8;

use flate2::Compression;

use crate::error::CompressError;

/// Compression levels recognised by the deflate contexts.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CompressionLevel {
    /// Favour speed over compression ratio (zlib level 1).
    Fast,
    /// zlib's default balance (level 6).
    #[default]
    Default,
    /// Best ratio (level 9).
    Best,
    /// An explicit zlib level in `1..=9`.
    Precise(NonZeroU8),
}

impl CompressionLevel {
    /// Maps a numeric `--compress-level` value onto a level.
    ///
    /// `0` is rejected here; callers treat it as "compression disabled".
    pub fn from_numeric(level: u32) -> Result<Self, CompressError> {
        match u8::try_from(level).ok().and_then(NonZeroU8::new) {
            Some(precise) if level <= 9 => Ok(Self::Precise(precise)),
            _ => Err(CompressError::InvalidLevel(level)),
        }
    }
}

impl From<CompressionLevel> for Compression {
    fn from(level: CompressionLevel) -> Self {
        match level {
            CompressionLevel::Fast => Self::fast(),
            CompressionLevel::Default => Self::default(),
            CompressionLevel::Best => Self::best(),
            CompressionLevel::Precise(value) => Self::new(u32::from(value.get())),
        }
    }
}
