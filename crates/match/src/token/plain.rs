//! crates/match/src/token/plain.rs
//!
//! Uncompressed token stream.
//!
//! ```text
//! literal  int n (> 0) followed by n bytes
//! block    int -(index + 1)
//! end      int 0
//! ```

use std::io::{Read, Write};

use protocol::MAX_CHUNK;
use protocol::varint::{read_int, write_int};

use crate::error::MatchError;

/// Encoder for the uncompressed stream.
#[derive(Debug, Default)]
pub struct PlainEncoder;

impl PlainEncoder {
    pub(crate) fn literal<W: Write + ?Sized>(
        &mut self,
        writer: &mut W,
        data: &[u8],
    ) -> Result<(), MatchError> {
        for chunk in data.chunks(MAX_CHUNK) {
            write_int(writer, chunk.len() as i32)?;
            writer.write_all(chunk)?;
        }
        Ok(())
    }

    pub(crate) fn block<W: Write + ?Sized>(
        &mut self,
        writer: &mut W,
        index: usize,
    ) -> Result<(), MatchError> {
        write_int(writer, -(index as i32) - 1)?;
        Ok(())
    }

    pub(crate) fn finish<W: Write + ?Sized>(&mut self, writer: &mut W) -> Result<(), MatchError> {
        write_int(writer, 0)?;
        Ok(())
    }
}

/// Decoder for the uncompressed stream.
///
/// Literal runs longer than [`MAX_CHUNK`] are handed out in pieces; the
/// remainder is reported through [`has_pending`](Self::has_pending).
#[derive(Debug, Default)]
pub struct PlainDecoder {
    residue: usize,
    buf: Vec<u8>,
    count: usize,
}

impl PlainDecoder {
    pub(crate) fn begin(&mut self, block_count: usize) {
        self.residue = 0;
        self.count = block_count;
    }

    pub(crate) const fn has_pending(&self) -> bool {
        self.residue > 0
    }

    pub(crate) fn next<R: Read + ?Sized>(
        &mut self,
        reader: &mut R,
    ) -> Result<Option<super::Token<'_>>, MatchError> {
        if self.residue == 0 {
            let value = read_int(reader)?;
            if value == 0 {
                return Ok(None);
            }
            if value < 0 {
                let index = -i64::from(value) - 1;
                if index >= self.count as i64 {
                    return Err(MatchError::BlockOutOfRange {
                        index,
                        count: self.count,
                    });
                }
                return Ok(Some(super::Token::Block(index as usize)));
            }
            self.residue = value as usize;
        }

        let n = self.residue.min(MAX_CHUNK);
        self.buf.resize(n, 0);
        reader.read_exact(&mut self.buf)?;
        self.residue -= n;
        Ok(Some(super::Token::Literal(&self.buf)))
    }
}
