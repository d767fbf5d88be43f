//! crates/match/src/matcher.rs
//!
//! Sliding-window search of the sender's file against the receiver's
//! block checksums.
//!
//! The window is one block long and slides a byte at a time with the
//! rolling checksum updated in O(1). A weak hit is confirmed with the
//! seeded strong digest, truncated to the length the receiver sent, before
//! it becomes a block event. Matched regions are skipped whole. Near the
//! end of the file the window shrinks so the short trailing block can still
//! match.

use std::ops::Range;

use checksums::{MD4_DIGEST_LEN, RollingChecksum, block_digest};
use logging::{debug_log, trace_delta};
use protocol::MAX_CHUNK;
use signature::{Block, BlockSet};

use crate::error::MatchError;
use crate::index::BlockHashTable;

/// One step of the delta between the sender's file and the basis.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MatchEvent {
    /// Bytes of the sender's file the receiver does not have. Never longer
    /// than [`MAX_CHUNK`].
    Literal(Range<usize>),
    /// Basis block `index` matches `range` of the sender's file.
    Block {
        /// Block index in the receiver's set.
        index: usize,
        /// Matching bytes in the sender's file.
        range: Range<usize>,
    },
}

/// Counters for one file's scan.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MatchStats {
    /// Blocks reused from the basis.
    pub matched_blocks: u64,
    /// Bytes covered by reused blocks.
    pub matched_bytes: u64,
    /// Bytes that must be sent.
    pub literal_bytes: u64,
    /// Weak hits rejected by the strong digest.
    pub false_alarms: u64,
}

/// Scanner over one mapped file.
#[derive(Debug)]
pub struct BlockMatcher<'a> {
    data: &'a [u8],
    set: &'a BlockSet,
    table: BlockHashTable,
    seed: i32,
    offset: usize,
    literal_start: usize,
    window: Option<RollingChecksum>,
    last_block: Option<usize>,
    pending: Option<MatchEvent>,
    stats: MatchStats,
}

impl<'a> BlockMatcher<'a> {
    /// Prepares a scan of `data` against `set`.
    #[must_use]
    pub fn new(data: &'a [u8], set: &'a BlockSet, seed: i32) -> Self {
        let table = BlockHashTable::new(set);
        debug_log!(
            Deltasum,
            2,
            "matching {} bytes against {} blocks of {} ({} distinct sums)",
            data.len(),
            table.len(),
            set.block_len(),
            table.distinct()
        );
        Self {
            data,
            set,
            table,
            seed,
            offset: 0,
            literal_start: 0,
            window: None,
            last_block: None,
            pending: None,
            stats: MatchStats::default(),
        }
    }

    /// Counters so far.
    #[must_use]
    pub const fn stats(&self) -> MatchStats {
        self.stats
    }

    /// Bytes of the file already accounted for by emitted events.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.literal_start
    }

    /// Produces the next event, or `None` once the whole file is covered.
    pub fn next_event(&mut self) -> Result<Option<MatchEvent>, MatchError> {
        if let Some(event) = self.pending.take() {
            return Ok(Some(event));
        }
        if self.table.is_empty() {
            return Ok(self.take_literal(self.data.len()));
        }

        let block_len = self.set.block_len() as usize;
        while self.offset < self.data.len() {
            if self.offset - self.literal_start >= MAX_CHUNK {
                return Ok(self.take_literal(self.offset));
            }

            let len = block_len.min(self.data.len() - self.offset);
            let mut sum = match self.window {
                Some(sum) => sum,
                None => RollingChecksum::from_block(&self.data[self.offset..self.offset + len]),
            };

            if let Some(index) = self.find_match(len, sum.value()) {
                let start = self.offset;
                self.offset += len;
                self.window = None;
                self.last_block = Some(index);
                self.stats.matched_blocks += 1;
                self.stats.matched_bytes += len as u64;
                trace_delta!(index, offset = start, "block match");

                let block = MatchEvent::Block {
                    index,
                    range: start..self.offset,
                };
                let literal = self.take_literal(start);
                self.literal_start = self.offset;
                return Ok(Some(match literal {
                    Some(literal) => {
                        self.pending = Some(block);
                        literal
                    }
                    None => block,
                }));
            }

            let outgoing = self.data[self.offset];
            if self.offset + len < self.data.len() {
                sum.roll(outgoing, self.data[self.offset + len])?;
            } else {
                sum.roll_out(outgoing)?;
            }
            self.offset += 1;
            self.window = (!sum.is_empty()).then_some(sum);
        }

        Ok(self.take_literal(self.data.len()))
    }

    /// Emits the literal run ending at `end`, capped at [`MAX_CHUNK`].
    fn take_literal(&mut self, end: usize) -> Option<MatchEvent> {
        if self.literal_start >= end {
            return None;
        }
        let stop = end.min(self.literal_start + MAX_CHUNK);
        let range = self.literal_start..stop;
        self.literal_start = stop;
        self.stats.literal_bytes += range.len() as u64;
        Some(MatchEvent::Literal(range))
    }

    /// Finds a block whose length, weak and strong sums all match the
    /// window at `offset`. The block after the previous match is tried
    /// first so runs of adjacent blocks stay adjacent.
    fn find_match(&mut self, len: usize, rolling: u32) -> Option<usize> {
        if !self.table.contains(rolling) {
            return None;
        }
        let data = self.data;
        let set = self.set;
        let window = &data[self.offset..self.offset + len];
        let mut strong: Option<[u8; MD4_DIGEST_LEN]> = None;
        let csum_len = set.csum_len();
        let seed = self.seed;

        let mut verify = |block: &Block, stats: &mut MatchStats| -> bool {
            if block.rolling() != rolling || block.len() as usize != len {
                return false;
            }
            let digest = strong.get_or_insert_with(|| block_digest(window, seed));
            if digest[..csum_len] == *block.strong(csum_len) {
                true
            } else {
                stats.false_alarms += 1;
                false
            }
        };

        if let Some(next) = self.last_block.map(|i| i + 1) {
            if let Some(block) = set.block(next) {
                if verify(block, &mut self.stats) {
                    return Some(next);
                }
            }
        }
        for &candidate in self.table.candidates(rolling) {
            let index = candidate as usize;
            if Some(index) == self.last_block.map(|i| i + 1) {
                continue;
            }
            if let Some(block) = set.block(index) {
                if verify(block, &mut self.stats) {
                    return Some(index);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::num::{NonZeroU8, NonZeroU32};

    use signature::{SignatureLayoutParams, calculate_signature_layout, generate_block_set};

    use super::*;

    fn set_for(data: &[u8], block: u32, csum: u8) -> BlockSet {
        let params = SignatureLayoutParams::new(
            data.len() as u64,
            NonZeroU32::new(block),
            NonZeroU8::new(csum).unwrap(),
        );
        let layout = calculate_signature_layout(params).unwrap();
        generate_block_set(data, layout, 0).unwrap()
    }

    fn collect(matcher: &mut BlockMatcher<'_>) -> Vec<MatchEvent> {
        let mut events = Vec::new();
        while let Some(event) = matcher.next_event().unwrap() {
            events.push(event);
        }
        events
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len as u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8).collect()
    }

    #[test]
    fn identical_file_is_all_blocks() {
        let data = sample(5000);
        let set = set_for(&data, 1000, 16);
        let mut matcher = BlockMatcher::new(&data, &set, 0);
        let events = collect(&mut matcher);
        let indices: Vec<usize> = events
            .iter()
            .map(|e| match e {
                MatchEvent::Block { index, .. } => *index,
                MatchEvent::Literal(_) => panic!("unexpected literal {e:?}"),
            })
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(matcher.stats().matched_bytes, 5000);
        assert_eq!(matcher.stats().literal_bytes, 0);
    }

    #[test]
    fn inserted_bytes_become_one_literal() {
        let basis = sample(4000);
        let mut data = basis[..2000].to_vec();
        data.extend_from_slice(b"INSERTED");
        data.extend_from_slice(&basis[2000..]);

        let set = set_for(&basis, 500, 16);
        let mut matcher = BlockMatcher::new(&data, &set, 0);
        let events = collect(&mut matcher);
        assert!(events.contains(&MatchEvent::Literal(2000..2008)));
        assert_eq!(matcher.stats().literal_bytes, 8);
        assert_eq!(matcher.stats().matched_blocks, 8);
    }

    #[test]
    fn short_tail_block_matches_at_end() {
        let basis = sample(1234);
        let set = set_for(&basis, 500, 16);
        let mut data = b"xy".to_vec();
        data.extend_from_slice(&basis);
        let mut matcher = BlockMatcher::new(&data, &set, 0);
        let events = collect(&mut matcher);
        assert_eq!(events.first(), Some(&MatchEvent::Literal(0..2)));
        assert_eq!(
            events.last(),
            Some(&MatchEvent::Block {
                index: 2,
                range: 1002..1236
            })
        );
    }

    #[test]
    fn empty_set_sends_everything_in_chunks() {
        let data = sample(MAX_CHUNK * 2 + 10);
        let set = set_for(b"", 700, 2);
        let mut matcher = BlockMatcher::new(&data, &set, 0);
        let events = collect(&mut matcher);
        assert_eq!(
            events,
            vec![
                MatchEvent::Literal(0..MAX_CHUNK),
                MatchEvent::Literal(MAX_CHUNK..MAX_CHUNK * 2),
                MatchEvent::Literal(MAX_CHUNK * 2..MAX_CHUNK * 2 + 10),
            ]
        );
    }

    #[test]
    fn long_literal_runs_are_capped() {
        let basis = vec![1u8; 4096];
        let data = sample(MAX_CHUNK + 100);
        let set = set_for(&basis, 4096, 16);
        let mut matcher = BlockMatcher::new(&data, &set, 0);
        for event in collect(&mut matcher) {
            if let MatchEvent::Literal(range) = event {
                assert!(range.len() <= MAX_CHUNK);
            }
        }
        assert_eq!(matcher.stats().literal_bytes, (MAX_CHUNK + 100) as u64);
    }

    #[test]
    fn strong_mismatch_is_rejected() {
        let basis = sample(1400);
        let mut set_blocks = set_for(&basis, 700, 16).blocks().to_vec();
        let layout = set_for(&basis, 700, 16).layout();
        set_blocks[0] = Block::new(0, 0, 700, set_blocks[0].rolling(), &[0u8; 16]);
        let set = BlockSet::new(layout, set_blocks);

        let mut matcher = BlockMatcher::new(&basis, &set, 0);
        let events = collect(&mut matcher);
        assert_eq!(events[0], MatchEvent::Literal(0..700));
        assert_eq!(matcher.stats().false_alarms, 1);
    }

    #[test]
    fn empty_file_has_no_events() {
        let set = set_for(&sample(2000), 700, 2);
        let mut matcher = BlockMatcher::new(b"", &set, 0);
        assert!(matcher.next_event().unwrap().is_none());
    }
}
