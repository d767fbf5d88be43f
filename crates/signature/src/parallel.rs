//! crates/signature/src/parallel.rs
//!
//! Block checksums computed on the rayon pool for large basis files.

use rayon::prelude::*;

use crate::block::Block;
use crate::generation::block_for;
use crate::layout::SignatureLayout;

/// Block count from which generation fans out across threads.
pub const PARALLEL_THRESHOLD: usize = 256;

/// Checksums every block of `data` in parallel, preserving order.
pub(crate) fn generate_blocks_parallel(
    data: &[u8],
    layout: SignatureLayout,
    seed: i32,
    count: usize,
) -> Vec<Block> {
    (0..count)
        .into_par_iter()
        .map(|index| block_for(data, layout, index, seed))
        .collect()
}
