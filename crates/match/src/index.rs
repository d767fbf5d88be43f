//! crates/match/src/index.rs
//!
//! Lookup from weak checksum to the receiver's blocks.

use rustc_hash::FxHashMap;
use signature::BlockSet;

/// Maps rolling-checksum values to the indices of blocks carrying them.
///
/// Collision chains keep file order so the earliest block is tried first.
#[derive(Clone, Debug, Default)]
pub struct BlockHashTable {
    chains: FxHashMap<u32, Vec<u32>>,
    blocks: usize,
}

impl BlockHashTable {
    /// Indexes every block of `set`.
    #[must_use]
    pub fn new(set: &BlockSet) -> Self {
        let mut chains: FxHashMap<u32, Vec<u32>> = FxHashMap::default();
        chains.reserve(set.blocks().len());
        for block in set.blocks() {
            chains
                .entry(block.rolling())
                .or_default()
                .push(block.index() as u32);
        }
        Self {
            chains,
            blocks: set.blocks().len(),
        }
    }

    /// Candidate block indices for `rolling`, in file order.
    #[inline]
    #[must_use]
    pub fn candidates(&self, rolling: u32) -> &[u32] {
        self.chains.get(&rolling).map_or(&[], Vec::as_slice)
    }

    /// Whether any block carries `rolling`.
    #[inline]
    #[must_use]
    pub fn contains(&self, rolling: u32) -> bool {
        self.chains.contains_key(&rolling)
    }

    /// Number of indexed blocks.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.blocks
    }

    /// Whether the table indexes no blocks.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.blocks == 0
    }

    /// Number of distinct checksum values.
    #[must_use]
    pub fn distinct(&self) -> usize {
        self.chains.len()
    }
}
