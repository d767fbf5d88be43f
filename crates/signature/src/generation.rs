//! crates/signature/src/generation.rs
//!
//! Block-set generation from basis file contents.

use std::io::{self, Read};

use thiserror::Error;
#[cfg(feature = "tracing")]
use tracing::instrument;

use checksums::{block_digest, hash_fast};

use crate::block::{Block, BlockSet};
use crate::layout::{SignatureLayout, SignatureLayoutError};
use crate::parallel::{PARALLEL_THRESHOLD, generate_blocks_parallel};

/// Errors returned when generating or receiving block sets.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// Underlying I/O failure raised while reading file contents.
    #[error("failed to read basis while generating checksums: {0}")]
    Io(
        #[from]
        #[source]
        io::Error,
    ),
    /// The layout could not be computed.
    #[error(transparent)]
    Layout(#[from] SignatureLayoutError),
    /// The basis ended before the layout was covered.
    #[error("basis is {actual} bytes but the layout needs {expected}")]
    ShortInput {
        /// Bytes the layout describes.
        expected: u64,
        /// Bytes available.
        actual: u64,
    },
    /// Extra bytes were present in the input after consuming the layout.
    #[error("input contained trailing bytes beyond the expected layout")]
    TrailingData,
    /// Number of blocks exceeded the platform's addressable range.
    #[error("signature layout describes {0} blocks which exceeds addressable memory")]
    TooManyBlocks(u64),
    /// A received sum head field is out of range.
    #[error("invalid sum head: {field} = {value}")]
    InvalidHead {
        /// Offending field.
        field: &'static str,
        /// Value received.
        value: i64,
    },
}

impl From<SignatureError> for io::Error {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::Io(inner) => inner,
            other => Self::new(io::ErrorKind::InvalidData, other),
        }
    }
}

pub(crate) fn block_for(data: &[u8], layout: SignatureLayout, index: usize, seed: i32) -> Block {
    let block_len = layout.block_length().get() as usize;
    let start = index * block_len;
    let end = (start + block_len).min(data.len());
    let chunk = &data[start..end];
    let strong = block_digest(chunk, seed);
    let csum_len = usize::from(layout.strong_sum_length().get());
    Block::new(
        index,
        start as u64,
        chunk.len() as u32,
        hash_fast(chunk),
        &strong[..csum_len],
    )
}

/// Computes the block set of an in-memory (usually mapped) basis.
///
/// `data` must be exactly as long as the layout describes. Large sets are
/// checksummed on the rayon pool.
#[cfg_attr(
    feature = "tracing",
    instrument(
        skip(data),
        fields(len = data.len(), blocks = layout.block_count()),
        name = "generate_block_set"
    )
)]
pub fn generate_block_set(
    data: &[u8],
    layout: SignatureLayout,
    seed: i32,
) -> Result<BlockSet, SignatureError> {
    let expected = layout.file_size();
    let actual = data.len() as u64;
    if actual < expected {
        return Err(SignatureError::ShortInput { expected, actual });
    }
    if actual > expected {
        return Err(SignatureError::TrailingData);
    }
    let count = usize::try_from(layout.block_count())
        .map_err(|_| SignatureError::TooManyBlocks(layout.block_count()))?;

    let blocks = if count >= PARALLEL_THRESHOLD {
        generate_blocks_parallel(data, layout, seed, count)
    } else {
        (0..count).map(|i| block_for(data, layout, i, seed)).collect()
    };
    Ok(BlockSet::new(layout, blocks))
}

/// Computes a block set by streaming from `reader`.
///
/// The reader must yield exactly the number of bytes implied by `layout`.
pub fn generate_block_set_from_reader<R: Read>(
    mut reader: R,
    layout: SignatureLayout,
    seed: i32,
) -> Result<BlockSet, SignatureError> {
    let block_len = layout.block_length().get() as usize;
    let count = usize::try_from(layout.block_count())
        .map_err(|_| SignatureError::TooManyBlocks(layout.block_count()))?;
    let csum_len = usize::from(layout.strong_sum_length().get());

    let mut blocks = Vec::with_capacity(count);
    let mut buffer = vec![0u8; block_len];
    let mut offset = 0u64;
    for index in 0..count {
        let target_len = if index + 1 == count && layout.remainder() != 0 {
            layout.remainder() as usize
        } else {
            block_len
        };
        let chunk = &mut buffer[..target_len];
        reader.read_exact(chunk).map_err(|err| {
            if err.kind() == io::ErrorKind::UnexpectedEof {
                SignatureError::ShortInput {
                    expected: layout.file_size(),
                    actual: offset,
                }
            } else {
                SignatureError::Io(err)
            }
        })?;
        let strong = block_digest(chunk, seed);
        blocks.push(Block::new(
            index,
            offset,
            target_len as u32,
            hash_fast(chunk),
            &strong[..csum_len],
        ));
        offset += target_len as u64;
    }

    let mut extra = [0u8; 1];
    if reader.read(&mut extra)? != 0 {
        return Err(SignatureError::TrailingData);
    }
    Ok(BlockSet::new(layout, blocks))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::num::{NonZeroU8, NonZeroU32};

    use super::*;
    use crate::layout::{SignatureLayoutParams, calculate_signature_layout};

    fn layout(len: u64, block: u32, checksum_len: u8) -> SignatureLayout {
        calculate_signature_layout(SignatureLayoutParams::new(
            len,
            NonZeroU32::new(block),
            NonZeroU8::new(checksum_len).expect("checksum length"),
        ))
        .expect("layout")
    }

    #[test]
    fn blocks_carry_seeded_digests() {
        let data = b"hello world, hello rsync";
        let layout = layout(data.len() as u64, 8, 16);
        let set = generate_block_set(data, layout, 1234).expect("set");
        assert_eq!(set.count(), 3);
        let last = set.block(2).unwrap();
        assert_eq!(last.offset(), 16);
        assert_eq!(last.len(), 8);
        assert_eq!(last.rolling(), hash_fast(&data[16..]));
        assert_eq!(last.strong(16), block_digest(&data[16..], 1234));
    }

    #[test]
    fn reader_and_slice_agree() {
        let data: Vec<u8> = (0..5_000u32).map(|i| (i * 31 % 251) as u8).collect();
        let layout = layout(data.len() as u64, 700, 2);
        let from_slice = generate_block_set(&data, layout, 7).expect("slice");
        let from_reader =
            generate_block_set_from_reader(Cursor::new(&data), layout, 7).expect("reader");
        assert_eq!(from_slice, from_reader);
        assert_eq!(from_slice.block(7).unwrap().len(), 100);
    }

    #[test]
    fn empty_basis_has_no_blocks() {
        let set = generate_block_set(&[], layout(0, 0, 2), 0).expect("set");
        assert_eq!(set.count(), 0);
        assert!(set.blocks().is_empty());
    }

    #[test]
    fn length_mismatches_are_reported() {
        let layout = layout(10, 4, 2);
        assert!(matches!(
            generate_block_set(&[0; 9], layout, 0),
            Err(SignatureError::ShortInput { expected: 10, actual: 9 })
        ));
        assert!(matches!(
            generate_block_set(&[0; 11], layout, 0),
            Err(SignatureError::TrailingData)
        ));
        assert!(matches!(
            generate_block_set_from_reader(Cursor::new(vec![0; 11]), layout, 0),
            Err(SignatureError::TrailingData)
        ));
    }
}
