//! crates/signature/src/block.rs
//!
//! One file's partition into checksummed blocks.

use std::ops::Range;

use checksums::MD4_DIGEST_LEN;

use crate::layout::SignatureLayout;

/// A single checksummed block of the basis file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Block {
    index: usize,
    offset: u64,
    len: u32,
    rolling: u32,
    strong: [u8; MD4_DIGEST_LEN],
}

impl Block {
    /// Creates a block; `strong` is truncated or zero padded to the full
    /// digest width.
    #[must_use]
    pub fn new(index: usize, offset: u64, len: u32, rolling: u32, strong: &[u8]) -> Self {
        let mut full = [0u8; MD4_DIGEST_LEN];
        let n = strong.len().min(MD4_DIGEST_LEN);
        full[..n].copy_from_slice(&strong[..n]);
        Self {
            index,
            offset,
            len,
            rolling,
            strong: full,
        }
    }

    /// Position in the block set.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Byte offset in the basis file.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Length in bytes; only the last block may be short.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.len
    }

    /// Whether the block covers no bytes.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Weak rolling checksum.
    #[inline]
    #[must_use]
    pub const fn rolling(&self) -> u32 {
        self.rolling
    }

    /// Strong checksum truncated to `csum_len` bytes.
    #[inline]
    #[must_use]
    pub fn strong(&self, csum_len: usize) -> &[u8] {
        &self.strong[..csum_len.min(MD4_DIGEST_LEN)]
    }

    /// Byte range in the basis file.
    #[must_use]
    pub const fn range(&self) -> Range<u64> {
        self.offset..self.offset + self.len as u64
    }
}

/// Block checksums describing one basis file.
///
/// `count = ceil(size / block_len)` and the last block is `remainder`
/// bytes long when the remainder is non-zero.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BlockSet {
    layout: SignatureLayout,
    blocks: Vec<Block>,
}

impl BlockSet {
    /// Pairs a layout with its blocks.
    #[must_use]
    pub const fn new(layout: SignatureLayout, blocks: Vec<Block>) -> Self {
        Self { layout, blocks }
    }

    /// The layout the blocks were cut with.
    #[must_use]
    pub const fn layout(&self) -> SignatureLayout {
        self.layout
    }

    /// Total basis size described by the layout.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.layout.file_size()
    }

    /// Nominal block length.
    #[must_use]
    pub const fn block_len(&self) -> u32 {
        self.layout.block_length().get()
    }

    /// Length of the short trailing block, or `0`.
    #[must_use]
    pub const fn remainder(&self) -> u32 {
        self.layout.remainder()
    }

    /// Strong checksum bytes per block.
    #[must_use]
    pub const fn csum_len(&self) -> usize {
        self.layout.strong_sum_length().get() as usize
    }

    /// Number of blocks the layout describes.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.layout.block_count() as usize
    }

    /// Blocks in file order. Empty in append mode, where no sums travel.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Block `index`, if it exists.
    #[must_use]
    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Length of block `index` computed from the layout alone.
    #[must_use]
    pub fn block_len_at(&self, index: usize) -> Option<u32> {
        let count = self.count();
        if index >= count {
            None
        } else if index + 1 == count && self.remainder() != 0 {
            Some(self.remainder())
        } else {
            Some(self.block_len())
        }
    }

    /// Byte range of block `index` in the basis, computed from the layout.
    #[must_use]
    pub fn range_of(&self, index: usize) -> Option<Range<u64>> {
        let len = self.block_len_at(index)?;
        let start = index as u64 * u64::from(self.block_len());
        Some(start..start + u64::from(len))
    }
}

#[cfg(test)]
mod tests {
    use std::num::{NonZeroU8, NonZeroU32};

    use super::*;

    fn set(len: u32, rem: u32, count: u64) -> BlockSet {
        let layout = SignatureLayout::from_raw_parts(
            NonZeroU32::new(len).unwrap(),
            rem,
            count,
            NonZeroU8::new(2).unwrap(),
        );
        BlockSet::new(layout, Vec::new())
    }

    #[test]
    fn last_block_uses_remainder() {
        let blocks = set(700, 32, 3);
        assert_eq!(blocks.block_len_at(0), Some(700));
        assert_eq!(blocks.block_len_at(2), Some(32));
        assert_eq!(blocks.block_len_at(3), None);
        assert_eq!(blocks.range_of(2), Some(1400..1432));
        assert_eq!(blocks.size(), 1432);
    }

    #[test]
    fn zero_remainder_means_full_last_block() {
        let blocks = set(8, 0, 2);
        assert_eq!(blocks.block_len_at(1), Some(8));
        assert_eq!(blocks.size(), 16);
    }

    #[test]
    fn strong_is_truncated_on_request() {
        let block = Block::new(1, 700, 700, 42, &[1, 2, 3, 4]);
        assert_eq!(block.strong(2), &[1, 2]);
        assert_eq!(block.strong(16)[4..], [0; 12]);
        assert_eq!(block.range(), 700..1400);
    }
}
