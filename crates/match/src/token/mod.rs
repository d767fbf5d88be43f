//! crates/match/src/token/mod.rs
//!
//! Token streams carrying a file's delta across the connection.
//!
//! A stream is a sequence of literal runs and block references closed by an
//! end marker. Two encodings exist, chosen once per session: the plain
//! integer form and the compressed form used with `--compress`.

mod deflated;
mod plain;

use std::io::{Read, Write};

use checksums::{MD4_DIGEST_LEN, file_digest};
use compress::CompressionLevel;
use signature::BlockSet;
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::error::MatchError;
use crate::matcher::{BlockMatcher, MatchEvent, MatchStats};

pub use deflated::{DeflatedDecoder, DeflatedEncoder, MAX_DATA_COUNT};
pub use plain::{PlainDecoder, PlainEncoder};

/// One decoded instruction.
#[derive(Debug, Eq, PartialEq)]
pub enum Token<'a> {
    /// Bytes to append to the reconstructed file.
    Literal(&'a [u8]),
    /// Append basis block `index`.
    Block(usize),
}

/// Sender half of the token stream.
#[derive(Debug)]
pub enum TokenEncoder {
    /// Uncompressed integers and raw literal bytes.
    Plain(PlainEncoder),
    /// Deflated literals and run-length block references.
    Deflated(Box<DeflatedEncoder>),
}

impl TokenEncoder {
    /// Uncompressed encoder.
    #[must_use]
    pub const fn plain() -> Self {
        Self::Plain(PlainEncoder)
    }

    /// Compressed encoder for a connection speaking `protocol`.
    #[must_use]
    pub fn deflated(level: CompressionLevel, protocol: u32) -> Self {
        Self::Deflated(Box::new(DeflatedEncoder::new(level, protocol)))
    }

    /// Resets per-file state. Call before the first token of every file.
    pub fn begin(&mut self) -> Result<(), MatchError> {
        match self {
            Self::Plain(_) => Ok(()),
            Self::Deflated(enc) => enc.begin(),
        }
    }

    /// Appends literal bytes.
    pub fn literal<W: Write + ?Sized>(
        &mut self,
        writer: &mut W,
        data: &[u8],
    ) -> Result<(), MatchError> {
        match self {
            Self::Plain(enc) => enc.literal(writer, data),
            Self::Deflated(enc) => enc.literal(writer, data),
        }
    }

    /// Appends a reference to block `index`; `data` is the matching content,
    /// used to keep the compression history in step.
    pub fn block<W: Write + ?Sized>(
        &mut self,
        writer: &mut W,
        index: usize,
        data: &[u8],
    ) -> Result<(), MatchError> {
        match self {
            Self::Plain(enc) => enc.block(writer, index),
            Self::Deflated(enc) => enc.block(writer, index, data),
        }
    }

    /// Writes one matcher event whose ranges refer to `source`.
    pub fn emit<W: Write + ?Sized>(
        &mut self,
        writer: &mut W,
        source: &[u8],
        event: &MatchEvent,
    ) -> Result<(), MatchError> {
        match event {
            MatchEvent::Literal(range) => self.literal(writer, &source[range.clone()]),
            MatchEvent::Block { index, range } => {
                self.block(writer, *index, &source[range.clone()])
            }
        }
    }

    /// Closes the file's stream with the end marker.
    pub fn finish<W: Write + ?Sized>(&mut self, writer: &mut W) -> Result<(), MatchError> {
        match self {
            Self::Plain(enc) => enc.finish(writer),
            Self::Deflated(enc) => enc.finish(writer),
        }
    }
}

/// Receiver half of the token stream.
///
/// [`next_token`](Self::next_token) maps onto the downloader's token
/// states: `Err` is an error, `Ok(None)` the end of the file, and
/// `Ok(Some(_))` a token. When [`has_pending`](Self::has_pending) is true
/// after a token, more output is available without touching the wire.
#[derive(Debug)]
pub enum TokenDecoder {
    /// Uncompressed stream.
    Plain(PlainDecoder),
    /// Compressed stream.
    Deflated(Box<DeflatedDecoder>),
}

impl TokenDecoder {
    /// Uncompressed decoder.
    #[must_use]
    pub fn plain() -> Self {
        Self::Plain(PlainDecoder::default())
    }

    /// Compressed decoder for a connection speaking `protocol`.
    #[must_use]
    pub fn deflated(protocol: u32) -> Self {
        Self::Deflated(Box::new(DeflatedDecoder::new(protocol)))
    }

    /// Resets per-file state; block references must be below `block_count`.
    pub fn begin(&mut self, block_count: usize) -> Result<(), MatchError> {
        match self {
            Self::Plain(dec) => {
                dec.begin(block_count);
                Ok(())
            }
            Self::Deflated(dec) => dec.begin(block_count),
        }
    }

    /// Reads the next token.
    pub fn next_token<R: Read + ?Sized>(
        &mut self,
        reader: &mut R,
    ) -> Result<Option<Token<'_>>, MatchError> {
        match self {
            Self::Plain(dec) => dec.next(reader),
            Self::Deflated(dec) => dec.next(reader),
        }
    }

    /// Whether output is buffered from the last read.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        match self {
            Self::Plain(dec) => dec.has_pending(),
            Self::Deflated(dec) => dec.has_pending(),
        }
    }

    /// Reports the content of a block token the caller just copied from the
    /// basis.
    pub fn see_block(&mut self, data: &[u8]) -> Result<(), MatchError> {
        match self {
            Self::Plain(_) => Ok(()),
            Self::Deflated(dec) => dec.see_block(data),
        }
    }
}

/// Matches `data` against `set`, writes the whole token stream and then
/// the file digest.
#[cfg_attr(
    feature = "tracing",
    instrument(skip_all, fields(len = data.len(), blocks = set.count()))
)]
pub fn send_delta<W: Write + ?Sized>(
    writer: &mut W,
    data: &[u8],
    set: &BlockSet,
    seed: i32,
    encoder: &mut TokenEncoder,
) -> Result<MatchStats, MatchError> {
    let mut matcher = BlockMatcher::new(data, set, seed);
    encoder.begin()?;
    while let Some(event) = matcher.next_event()? {
        encoder.emit(writer, data, &event)?;
    }
    encoder.finish(writer)?;
    writer.write_all(&file_digest(data, seed))?;
    Ok(matcher.stats())
}

/// Rebuilds a file from a token stream and returns the sender's digest
/// together with whether it matches the rebuilt content.
pub fn receive_delta<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    basis: &[u8],
    set: &BlockSet,
    seed: i32,
    decoder: &mut TokenDecoder,
    out: &mut W,
) -> Result<([u8; MD4_DIGEST_LEN], bool), MatchError> {
    let mut digest = checksums::FileDigest::new(seed);
    decoder.begin(set.count())?;
    while let Some(token) = decoder.next_token(reader)? {
        match token {
            Token::Literal(bytes) => {
                digest.update(bytes);
                out.write_all(bytes)?;
            }
            Token::Block(index) => {
                let bytes = set
                    .range_of(index)
                    .and_then(|range| basis.get(range.start as usize..range.end as usize))
                    .ok_or(MatchError::BlockOutOfRange {
                        index: index as i64,
                        count: set.count(),
                    })?;
                digest.update(bytes);
                out.write_all(bytes)?;
                decoder.see_block(bytes)?;
            }
        }
    }
    let mut sent = [0u8; MD4_DIGEST_LEN];
    reader.read_exact(&mut sent)?;
    Ok((sent, digest.finalize() == sent))
}
