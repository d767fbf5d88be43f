//! crates/signature/src/layout.rs
//!
//! Block sizing: square root of the file size rounded down to a multiple
//! of eight, never below 700 bytes, plus the strong-sum length bias.

use core::num::{NonZeroU8, NonZeroU32};

use thiserror::Error;

/// Minimum block length, used for every file under 490,000 bytes.
pub const BLOCK_SIZE: u32 = 700;
/// Largest block length accepted on the wire.
pub const MAX_BLOCK_SIZE: u32 = 1 << 29;
const BLOCKSUM_BIAS: u32 = 10;
const SUM_LENGTH: u8 = checksums::MD4_DIGEST_LEN as u8;

/// Inputs to [`calculate_signature_layout`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SignatureLayoutParams {
    file_length: u64,
    forced_block_length: Option<NonZeroU32>,
    checksum_length: NonZeroU8,
}

impl SignatureLayoutParams {
    /// Describes a basis of `file_length` bytes.
    ///
    /// `forced_block_length` is `--block-size`. `checksum_length` is the
    /// phase minimum: 2 in the first phase, 16 in the redo phase.
    #[must_use]
    pub const fn new(
        file_length: u64,
        forced_block_length: Option<NonZeroU32>,
        checksum_length: NonZeroU8,
    ) -> Self {
        Self {
            file_length,
            forced_block_length,
            checksum_length,
        }
    }
}

/// How a basis is cut into blocks and how long each strong sum is.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SignatureLayout {
    block_length: NonZeroU32,
    remainder: u32,
    block_count: u64,
    strong_sum_length: NonZeroU8,
}

impl SignatureLayout {
    /// Rebuilds a layout from a received sum head.
    #[must_use]
    pub const fn from_raw_parts(
        block_length: NonZeroU32,
        remainder: u32,
        block_count: u64,
        strong_sum_length: NonZeroU8,
    ) -> Self {
        Self {
            block_length,
            remainder,
            block_count,
            strong_sum_length,
        }
    }

    /// Nominal block length.
    #[must_use]
    pub const fn block_length(self) -> NonZeroU32 {
        self.block_length
    }

    /// Length of the short last block, `0` when every block is full.
    #[must_use]
    pub const fn remainder(self) -> u32 {
        self.remainder
    }

    /// Number of blocks in the layout.
    #[must_use]
    pub const fn block_count(self) -> u64 {
        self.block_count
    }

    /// Length of each block's strong checksum.
    #[must_use]
    pub const fn strong_sum_length(self) -> NonZeroU8 {
        self.strong_sum_length
    }

    /// Bytes the layout covers.
    #[must_use]
    pub fn file_size(self) -> u64 {
        match (self.block_count, self.remainder) {
            (0, _) => 0,
            (count, 0) => count * u64::from(self.block_length.get()),
            (count, rem) => (count - 1) * u64::from(self.block_length.get()) + u64::from(rem),
        }
    }
}

/// Why no layout exists for a basis.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum SignatureLayoutError {
    /// The length does not fit the wire's signed 64-bit field.
    #[error("file length {length} exceeds i64::MAX")]
    FileTooLarge {
        /// Basis length in bytes.
        length: u64,
    },
    /// The block count does not fit the sum head's 32-bit field.
    #[error("block count {blocks} derived from block length {block_length} exceeds i32::MAX")]
    BlockCountOverflow {
        /// Block length in use.
        block_length: u32,
        /// Blocks it would take.
        blocks: u64,
    },
}

/// Chooses block length, count, remainder and strong-sum length for a basis.
#[doc(alias = "--block-size")]
pub fn calculate_signature_layout(
    params: SignatureLayoutParams,
) -> Result<SignatureLayout, SignatureLayoutError> {
    let length = params.file_length;
    if i64::try_from(length).is_err() {
        return Err(SignatureLayoutError::FileTooLarge { length });
    }

    let block_length = params
        .forced_block_length
        .map_or_else(|| square_root_block(length), NonZeroU32::get)
        .min(MAX_BLOCK_SIZE);
    let block_length = NonZeroU32::new(block_length).unwrap_or(NonZeroU32::MIN);

    let blocks = length.div_ceil(u64::from(block_length.get()));
    if i32::try_from(blocks).is_err() {
        return Err(SignatureLayoutError::BlockCountOverflow {
            block_length: block_length.get(),
            blocks,
        });
    }

    Ok(SignatureLayout {
        block_length,
        remainder: (length % u64::from(block_length.get())) as u32,
        block_count: blocks,
        strong_sum_length: strong_sum_length(length, block_length, params.checksum_length),
    })
}

/// Largest multiple of eight whose square fits in `length`.
fn square_root_block(length: u64) -> u32 {
    let root = length.isqrt() & !7;
    u32::try_from(root).map_or(MAX_BLOCK_SIZE, |root| root.clamp(BLOCK_SIZE, MAX_BLOCK_SIZE))
}

/// Grows the first-phase sum with the file so that a false block match
/// stays unlikely; the redo phase always uses the full digest.
fn strong_sum_length(length: u64, block_length: NonZeroU32, minimum: NonZeroU8) -> NonZeroU8 {
    if minimum.get() >= SUM_LENGTH {
        return minimum;
    }
    let bias = BLOCKSUM_BIAS + 2 * length.checked_ilog2().unwrap_or(0);
    let bias = bias.saturating_sub(block_length.ilog2());
    let bytes = (i64::from(bias) + 1 - 32 + 7) / 8;
    let bytes = bytes.clamp(i64::from(minimum.get()), i64::from(SUM_LENGTH));
    NonZeroU8::new(bytes as u8).unwrap_or(minimum)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(length: u64, forced: Option<u32>, minimum: u8) -> SignatureLayout {
        let params = SignatureLayoutParams::new(
            length,
            forced.and_then(NonZeroU32::new),
            NonZeroU8::new(minimum).unwrap(),
        );
        calculate_signature_layout(params).unwrap()
    }

    #[test]
    fn small_files_use_the_minimum_block() {
        let small = layout(32, None, 16);
        assert_eq!(small.block_length().get(), BLOCK_SIZE);
        assert_eq!((small.block_count(), small.remainder()), (1, 32));
        assert_eq!(small.strong_sum_length().get(), 16);
        assert_eq!(layout(490_000, None, 2).block_length().get(), BLOCK_SIZE);
        assert_eq!(layout(1_000_000, None, 2).block_length().get(), 1_000);
    }

    #[test]
    fn ten_mebibytes() {
        let ten = layout(10 * 1024 * 1024, None, 2);
        assert_eq!(ten.block_length().get(), 3_232);
        assert_eq!((ten.block_count(), ten.remainder()), (3_245, 1_152));
        assert_eq!(ten.strong_sum_length().get(), 2);
        assert_eq!(ten.file_size(), 10 * 1024 * 1024);
    }

    #[test]
    fn strong_sums_grow_only_for_huge_files() {
        assert_eq!(layout(1 << 20, None, 2).strong_sum_length().get(), 2);
        let huge = layout(1 << 34, None, 2).strong_sum_length().get();
        assert!((3..=16).contains(&huge), "{huge}");
    }

    #[test]
    fn block_size_override() {
        let forced = layout(50_000, Some(4_096), 16);
        assert_eq!(forced.block_length().get(), 4_096);
        assert_eq!((forced.block_count(), forced.remainder()), (13, 848));
        let empty = layout(0, None, 2);
        assert_eq!((empty.block_count(), empty.file_size()), (0, 0));
    }

    #[test]
    fn oversized_inputs_are_errors() {
        let too_many = SignatureLayoutParams::new(
            (i32::MAX as u64 + 1) * u64::from(BLOCK_SIZE),
            NonZeroU32::new(BLOCK_SIZE),
            NonZeroU8::new(16).unwrap(),
        );
        assert!(matches!(
            calculate_signature_layout(too_many),
            Err(SignatureLayoutError::BlockCountOverflow { block_length: BLOCK_SIZE, .. })
        ));
        let too_long = SignatureLayoutParams::new(u64::MAX, None, NonZeroU8::new(16).unwrap());
        assert!(matches!(
            calculate_signature_layout(too_long),
            Err(SignatureLayoutError::FileTooLarge { .. })
        ));
    }
}
