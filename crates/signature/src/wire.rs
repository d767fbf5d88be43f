//! crates/signature/src/wire.rs
//!
//! Sum head and per-block checksums as they travel from the receiver to
//! the sender: four ints `(count, block_len, csum_len, remainder)` followed
//! by `(rolling:int, strong:csum_len bytes)` per block.

use std::io::{Read, Write};
use std::num::{NonZeroU8, NonZeroU32};

use checksums::MD4_DIGEST_LEN;
use protocol::varint::{read_int, write_int};

use crate::block::{Block, BlockSet};
use crate::generation::SignatureError;
use crate::layout::{BLOCK_SIZE, MAX_BLOCK_SIZE, SignatureLayout};

/// The four-int header in front of a block set.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SumHead {
    /// Number of blocks.
    pub count: i32,
    /// Nominal block length.
    pub block_len: i32,
    /// Strong checksum bytes per block.
    pub csum_len: i32,
    /// Length of the short last block, or `0`.
    pub remainder: i32,
}

impl SumHead {
    /// Header for a transfer with no basis.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            count: 0,
            block_len: 0,
            csum_len: 0,
            remainder: 0,
        }
    }

    /// Header describing `set`.
    #[must_use]
    pub fn of(set: &BlockSet) -> Self {
        Self {
            count: set.count() as i32,
            block_len: set.block_len() as i32,
            csum_len: set.csum_len() as i32,
            remainder: set.remainder() as i32,
        }
    }

    /// Writes the four ints.
    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> std::io::Result<()> {
        write_int(writer, self.count)?;
        write_int(writer, self.block_len)?;
        write_int(writer, self.csum_len)?;
        write_int(writer, self.remainder)
    }

    /// Reads and range-checks a header.
    pub fn read<R: Read + ?Sized>(reader: &mut R) -> Result<Self, SignatureError> {
        let head = Self {
            count: read_int(reader)?,
            block_len: read_int(reader)?,
            csum_len: read_int(reader)?,
            remainder: read_int(reader)?,
        };
        head.validate()?;
        Ok(head)
    }

    fn validate(&self) -> Result<(), SignatureError> {
        let invalid = |field, value: i32| SignatureError::InvalidHead {
            field,
            value: i64::from(value),
        };
        if self.count < 0 {
            return Err(invalid("count", self.count));
        }
        if self.block_len < 0
            || self.block_len as u32 > MAX_BLOCK_SIZE
            || (self.count > 0 && self.block_len == 0)
        {
            return Err(invalid("block length", self.block_len));
        }
        if self.csum_len < 0
            || self.csum_len as usize > MD4_DIGEST_LEN
            || (self.count > 0 && self.csum_len == 0)
        {
            return Err(invalid("checksum length", self.csum_len));
        }
        if self.remainder < 0 || self.remainder > self.block_len {
            return Err(invalid("remainder", self.remainder));
        }
        Ok(())
    }

    /// Whether no blocks follow.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Layout described by a validated header.
    #[must_use]
    pub fn layout(&self) -> SignatureLayout {
        let block_len = NonZeroU32::new(self.block_len as u32)
            .or(NonZeroU32::new(BLOCK_SIZE))
            .unwrap_or(NonZeroU32::MIN);
        let csum_len = NonZeroU8::new(self.csum_len as u8)
            .or(NonZeroU8::new(checksums::CSUM_LENGTH_PHASE1 as u8))
            .unwrap_or(NonZeroU8::MIN);
        SignatureLayout::from_raw_parts(
            block_len,
            self.remainder as u32,
            self.count as u64,
            csum_len,
        )
    }
}

/// Sends the sum head and, unless `append` is set, every block checksum.
pub fn write_block_set<W: Write + ?Sized>(
    writer: &mut W,
    set: &BlockSet,
    append: bool,
) -> std::io::Result<()> {
    SumHead::of(set).write(writer)?;
    if append {
        return Ok(());
    }
    let csum_len = set.csum_len();
    for block in set.blocks() {
        write_int(writer, block.rolling() as i32)?;
        writer.write_all(block.strong(csum_len))?;
    }
    Ok(())
}

/// Receives a block set written by [`write_block_set`].
///
/// In append mode only the header travels and the set has no blocks.
pub fn read_block_set<R: Read + ?Sized>(
    reader: &mut R,
    append: bool,
) -> Result<BlockSet, SignatureError> {
    let head = SumHead::read(reader)?;
    read_blocks(reader, head, append)
}

/// Receives the blocks following an already read `head`.
pub fn read_blocks<R: Read + ?Sized>(
    reader: &mut R,
    head: SumHead,
    append: bool,
) -> Result<BlockSet, SignatureError> {
    let layout = head.layout();
    let skeleton = BlockSet::new(layout, Vec::new());
    if append || head.is_empty() {
        return Ok(skeleton);
    }
    let count = head.count as usize;
    let csum_len = head.csum_len as usize;
    let mut blocks = Vec::with_capacity(count.min(1 << 16));
    let mut strong = [0u8; MD4_DIGEST_LEN];
    for index in 0..count {
        let rolling = read_int(reader)? as u32;
        reader.read_exact(&mut strong[..csum_len])?;
        let len = skeleton.block_len_at(index).unwrap_or_default();
        let offset = index as u64 * u64::from(skeleton.block_len());
        blocks.push(Block::new(index, offset, len, rolling, &strong[..csum_len]));
    }
    Ok(BlockSet::new(layout, blocks))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::generation::generate_block_set;
    use crate::layout::{SignatureLayoutParams, calculate_signature_layout};

    fn sample() -> BlockSet {
        let data: Vec<u8> = (0..2_000u32).map(|i| (i % 97) as u8).collect();
        let layout = calculate_signature_layout(SignatureLayoutParams::new(
            data.len() as u64,
            None,
            NonZeroU8::new(2).unwrap(),
        ))
        .unwrap();
        generate_block_set(&data, layout, 5).unwrap()
    }

    #[test]
    fn block_set_crosses_the_wire() {
        let set = sample();
        let mut wire = Vec::new();
        write_block_set(&mut wire, &set, false).unwrap();
        assert_eq!(wire.len(), 16 + set.count() * (4 + 2));
        let back = read_block_set(&mut Cursor::new(wire), false).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn append_mode_sends_header_only() {
        let set = sample();
        let mut wire = Vec::new();
        write_block_set(&mut wire, &set, true).unwrap();
        assert_eq!(wire.len(), 16);
        let back = read_block_set(&mut Cursor::new(wire), true).unwrap();
        assert!(back.blocks().is_empty());
        assert_eq!(back.size(), 2_000);
    }

    #[test]
    fn empty_head_is_valid() {
        let mut wire = Vec::new();
        SumHead::empty().write(&mut wire).unwrap();
        let back = read_block_set(&mut Cursor::new(wire), false).unwrap();
        assert_eq!(back.count(), 0);
        assert_eq!(back.size(), 0);
    }

    #[test]
    fn out_of_range_fields_are_rejected() {
        for (head, field) in [
            (SumHead { count: -1, ..SumHead::empty() }, "count"),
            (SumHead { count: 1, block_len: 0, csum_len: 2, remainder: 0 }, "block length"),
            (SumHead { count: 1, block_len: 700, csum_len: 17, remainder: 0 }, "checksum length"),
            (SumHead { count: 1, block_len: 700, csum_len: 2, remainder: 701 }, "remainder"),
        ] {
            let mut wire = Vec::new();
            head.write(&mut wire).unwrap();
            match SumHead::read(&mut Cursor::new(wire)) {
                Err(SignatureError::InvalidHead { field: got, .. }) => assert_eq!(got, field),
                other => panic!("expected {field} rejection, got {other:?}"),
            }
        }
    }
}
