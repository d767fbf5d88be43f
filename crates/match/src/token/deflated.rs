//! crates/match/src/token/deflated.rs
//!
//! Compressed token stream.
//!
//! Literal bytes travel as raw-deflate output split into `DEFLATED_DATA`
//! pieces. Before any block token the compressor is sync-flushed with the
//! trailing `00 00 ff ff` removed. Block tokens are run-length coded
//! relative to the end of the previous run:
//!
//! ```text
//! 00            end of file
//! 20 int        block `int`
//! 21 int lo hi  blocks `int ..= int + (hi << 8 | lo)`
//! 01dd dddd xx  DEFLATED_DATA, 14-bit length followed by the bytes
//! 10rr rrrr     block at (previous run end + r)
//! 11rr rrrr lo hi  run starting at (previous run end + r)
//! ```
//!
//! Matched bytes are inserted into both dictionaries so later literals can
//! reference them.

use std::io::{Read, Write};

use compress::{CompressionLevel, DeflateContext, InflateContext};
use protocol::varint::{read_byte, read_int, write_byte, write_int};

use crate::error::MatchError;

const END_FLAG: u8 = 0x00;
const TOKEN_LONG: u8 = 0x20;
const TOKENRUN_LONG: u8 = 0x21;
const DEFLATED_DATA: u8 = 0x40;
const TOKEN_REL: u8 = 0x80;
const TOKENRUN_REL: u8 = 0xc0;

/// Largest compressed piece a `DEFLATED_DATA` header can describe.
pub const MAX_DATA_COUNT: usize = 16383;

const MAX_RUN: i64 = 65536;

/// Encoder for the compressed stream.
#[derive(Debug)]
pub struct DeflatedEncoder {
    ctx: DeflateContext,
    last_token: i64,
    run_start: i64,
    last_run_end: i64,
    has_run: bool,
    flush_pending: bool,
    out: Vec<u8>,
}

impl DeflatedEncoder {
    pub(crate) fn new(level: CompressionLevel, protocol: u32) -> Self {
        Self {
            ctx: DeflateContext::new(level, protocol),
            last_token: -1,
            run_start: 0,
            last_run_end: 0,
            has_run: false,
            flush_pending: false,
            out: Vec::with_capacity(MAX_DATA_COUNT * 2),
        }
    }

    pub(crate) fn begin(&mut self) -> Result<(), MatchError> {
        self.ctx.abort();
        self.ctx.begin()?;
        self.last_token = -1;
        self.run_start = 0;
        self.last_run_end = 0;
        self.has_run = false;
        self.flush_pending = false;
        self.out.clear();
        Ok(())
    }

    pub(crate) fn literal<W: Write + ?Sized>(
        &mut self,
        writer: &mut W,
        data: &[u8],
    ) -> Result<(), MatchError> {
        if data.is_empty() {
            return Ok(());
        }
        if self.has_run {
            self.write_run(writer)?;
            self.has_run = false;
        }
        self.ctx.feed(data, &mut self.out)?;
        self.drain(writer, false)?;
        self.flush_pending = true;
        Ok(())
    }

    pub(crate) fn block<W: Write + ?Sized>(
        &mut self,
        writer: &mut W,
        index: usize,
        data: &[u8],
    ) -> Result<(), MatchError> {
        self.flush_literals(writer)?;
        let index = index as i64;
        if self.has_run && index == self.last_token + 1 && index < self.run_start + MAX_RUN {
            self.last_token = index;
        } else {
            if self.has_run {
                self.write_run(writer)?;
            }
            self.run_start = index;
            self.last_token = index;
            self.has_run = true;
        }
        self.ctx.insert(data)?;
        Ok(())
    }

    pub(crate) fn finish<W: Write + ?Sized>(&mut self, writer: &mut W) -> Result<(), MatchError> {
        self.flush_literals(writer)?;
        if self.has_run {
            self.write_run(writer)?;
            self.has_run = false;
        }
        write_byte(writer, END_FLAG)?;
        self.ctx.finish()?;
        Ok(())
    }

    fn flush_literals<W: Write + ?Sized>(&mut self, writer: &mut W) -> Result<(), MatchError> {
        if self.flush_pending {
            self.ctx.flush(&mut self.out)?;
            self.drain(writer, true)?;
            self.flush_pending = false;
        }
        Ok(())
    }

    /// Writes buffered compressed bytes as `DEFLATED_DATA` pieces; a short
    /// tail is held back unless `all` is set.
    fn drain<W: Write + ?Sized>(&mut self, writer: &mut W, all: bool) -> Result<(), MatchError> {
        let mut start = 0;
        while self.out.len() - start >= MAX_DATA_COUNT || (all && start < self.out.len()) {
            let n = (self.out.len() - start).min(MAX_DATA_COUNT);
            writer.write_all(&[DEFLATED_DATA | (n >> 8) as u8, n as u8])?;
            writer.write_all(&self.out[start..start + n])?;
            start += n;
        }
        self.out.drain(..start);
        Ok(())
    }

    fn write_run<W: Write + ?Sized>(&mut self, writer: &mut W) -> Result<(), MatchError> {
        let r = self.run_start - self.last_run_end;
        let n = self.last_token - self.run_start;
        if (0..=63).contains(&r) {
            let base = if n == 0 { TOKEN_REL } else { TOKENRUN_REL };
            write_byte(writer, base + r as u8)?;
        } else {
            write_byte(writer, if n == 0 { TOKEN_LONG } else { TOKENRUN_LONG })?;
            write_int(writer, self.run_start as i32)?;
        }
        if n != 0 {
            write_byte(writer, n as u8)?;
            write_byte(writer, (n >> 8) as u8)?;
        }
        self.last_run_end = self.last_token;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum RecvState {
    Idle,
    Inflated,
    Running,
}

/// Decoder for the compressed stream.
#[derive(Debug)]
pub struct DeflatedDecoder {
    ctx: InflateContext,
    state: RecvState,
    rx_token: i64,
    rx_run: u32,
    saved_flag: Option<u8>,
    compressed: Vec<u8>,
    plain: Vec<u8>,
    count: usize,
}

impl DeflatedDecoder {
    pub(crate) fn new(protocol: u32) -> Self {
        Self {
            ctx: InflateContext::new(protocol),
            state: RecvState::Idle,
            rx_token: 0,
            rx_run: 0,
            saved_flag: None,
            compressed: Vec::with_capacity(MAX_DATA_COUNT),
            plain: Vec::new(),
            count: 0,
        }
    }

    pub(crate) fn begin(&mut self, block_count: usize) -> Result<(), MatchError> {
        self.ctx.abort();
        self.ctx.begin()?;
        self.state = RecvState::Idle;
        self.rx_token = 0;
        self.rx_run = 0;
        self.saved_flag = None;
        self.count = block_count;
        Ok(())
    }

    pub(crate) const fn has_pending(&self) -> bool {
        matches!(self.state, RecvState::Running) || self.saved_flag.is_some()
    }

    pub(crate) fn see_block(&mut self, data: &[u8]) -> Result<(), MatchError> {
        self.ctx.insert(data)?;
        Ok(())
    }

    pub(crate) fn next<R: Read + ?Sized>(
        &mut self,
        reader: &mut R,
    ) -> Result<Option<super::Token<'_>>, MatchError> {
        loop {
            if self.state == RecvState::Running {
                self.rx_token += 1;
                self.rx_run -= 1;
                if self.rx_run == 0 {
                    self.state = RecvState::Idle;
                }
                return self.block().map(Some);
            }

            let flag = match self.saved_flag.take() {
                Some(flag) => flag,
                None => read_byte(reader)?,
            };

            if flag & 0xc0 == DEFLATED_DATA {
                let len = (usize::from(flag & 0x3f) << 8) | usize::from(read_byte(reader)?);
                self.compressed.resize(len, 0);
                reader.read_exact(&mut self.compressed)?;
                self.plain.clear();
                self.ctx.feed(&self.compressed, &mut self.plain)?;
                self.state = RecvState::Inflated;
                if self.plain.is_empty() {
                    continue;
                }
                return Ok(Some(super::Token::Literal(&self.plain)));
            }

            if self.state == RecvState::Inflated {
                self.state = RecvState::Idle;
                self.plain.clear();
                self.ctx.sync(&mut self.plain)?;
                if !self.plain.is_empty() {
                    self.saved_flag = Some(flag);
                    return Ok(Some(super::Token::Literal(&self.plain)));
                }
            }

            if flag == END_FLAG {
                self.ctx.finish()?;
                return Ok(None);
            }

            let mut kind = flag;
            if flag & TOKEN_REL != 0 {
                self.rx_token += i64::from(flag & 0x3f);
                kind >>= 6;
            } else if flag == TOKEN_LONG || flag == TOKENRUN_LONG {
                self.rx_token = i64::from(read_int(reader)?);
            } else {
                return Err(MatchError::InvalidFlag(flag));
            }
            if kind & 1 != 0 {
                let lo = u32::from(read_byte(reader)?);
                let hi = u32::from(read_byte(reader)?);
                self.rx_run = lo | (hi << 8);
                if self.rx_run != 0 {
                    if i64::from(self.rx_run) >= MAX_RUN {
                        return Err(MatchError::RunTooLong(self.rx_run));
                    }
                    self.state = RecvState::Running;
                }
            }
            return self.block().map(Some);
        }
    }

    fn block(&self) -> Result<super::Token<'static>, MatchError> {
        if self.rx_token < 0 || self.rx_token >= self.count as i64 {
            return Err(MatchError::BlockOutOfRange {
                index: self.rx_token,
                count: self.count,
            });
        }
        Ok(super::Token::Block(self.rx_token as usize))
    }
}
