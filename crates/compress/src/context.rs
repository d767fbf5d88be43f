//! crates/compress/src/context.rs
//!
//! Per-connection deflate and inflate contexts.
//!
//! Each context owns one raw-deflate stream that persists across all files
//! of a transfer and is reset between files. The stream state is explicit:
//!
//! ```text
//!  Init --begin--> Ready --deflate/inflate--> Run <--> Sequence
//!                    ^                         |          |
//!                    +-------begin-------- Done <--finish-+
//! ```
//!
//! `Run` means literal data is flowing through the codec. `Sequence` means
//! matched-block bytes are being inserted into the history window only, so
//! both ends keep identical dictionaries without the bytes crossing the
//! wire.

use flate2::{Compress, Decompress, FlushCompress, FlushDecompress};

use crate::error::CompressError;
use crate::level::CompressionLevel;

/// Trailer produced by a sync flush; stripped by the sender and restored
/// by the receiver.
pub const SYNC_MARKER: [u8; 4] = [0x00, 0x00, 0xff, 0xff];

/// Largest run fed to the dictionary in one step.
pub const MAX_INSERT_CHUNK: usize = 0xffff;

const SCRATCH_LEN: usize = 128 * 1024;

/// Lifecycle of a compression stream.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StreamState {
    /// No stream has been set up yet.
    Init,
    /// Stream reset and ready for a new file.
    Ready,
    /// Literal data is being coded.
    Run,
    /// Matched-block data is being inserted into the history window.
    Sequence,
    /// The current file is complete.
    Done,
}

impl StreamState {
    const fn is_active(self) -> bool {
        matches!(self, Self::Ready | Self::Run | Self::Sequence)
    }
}

/// Sender-side compressor.
pub struct DeflateContext {
    stream: Compress,
    scratch: Vec<u8>,
    state: StreamState,
    protocol: u32,
}

impl std::fmt::Debug for DeflateContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeflateContext")
            .field("state", &self.state)
            .field("protocol", &self.protocol)
            .field("total_in", &self.stream.total_in())
            .field("total_out", &self.stream.total_out())
            .finish()
    }
}

impl DeflateContext {
    /// Creates a raw-deflate compressor for a connection speaking `protocol`.
    #[must_use]
    pub fn new(level: CompressionLevel, protocol: u32) -> Self {
        Self {
            stream: Compress::new(level.into(), false),
            scratch: Vec::new(),
            state: StreamState::Init,
            protocol,
        }
    }

    /// Current stream state.
    #[must_use]
    pub const fn state(&self) -> StreamState {
        self.state
    }

    /// Prepares the stream for a new file.
    pub fn begin(&mut self) -> Result<(), CompressError> {
        match self.state {
            StreamState::Init => self.scratch.resize(SCRATCH_LEN, 0),
            StreamState::Ready => return Ok(()),
            StreamState::Done => self.stream.reset(),
            found => {
                return Err(CompressError::State {
                    expected: "a finished or fresh stream",
                    found,
                });
            }
        }
        self.state = StreamState::Ready;
        Ok(())
    }

    /// Compresses `data` without flushing, appending whatever output the
    /// codec releases to `out`.
    pub fn feed(&mut self, data: &[u8], out: &mut Vec<u8>) -> Result<(), CompressError> {
        self.require_active()?;
        self.state = StreamState::Run;
        self.drive(data, FlushCompress::None, Some(out))
    }

    /// Sync-flushes pending output into `out` and strips the trailing
    /// [`SYNC_MARKER`].
    pub fn flush(&mut self, out: &mut Vec<u8>) -> Result<(), CompressError> {
        self.require_active()?;
        let start = out.len();
        self.drive(&[], FlushCompress::Sync, Some(out))?;
        if out.len() - start >= SYNC_MARKER.len() && out.ends_with(&SYNC_MARKER) {
            out.truncate(out.len() - SYNC_MARKER.len());
        }
        Ok(())
    }

    /// [`feed`](Self::feed) followed by [`flush`](Self::flush).
    pub fn deflate(&mut self, data: &[u8], out: &mut Vec<u8>) -> Result<(), CompressError> {
        self.feed(data, out)?;
        self.flush(out)
    }

    /// Inserts matched-block bytes into the history window, discarding the
    /// compressed output.
    ///
    /// Peers before protocol 31 re-feed the first chunk of a long run
    /// instead of advancing through it; that behaviour is reproduced so the
    /// dictionaries stay in step.
    pub fn insert(&mut self, data: &[u8]) -> Result<(), CompressError> {
        self.require_active()?;
        self.state = StreamState::Sequence;
        let mut remaining = data.len();
        let mut offset = 0;
        while remaining > 0 {
            let len = remaining.min(MAX_INSERT_CHUNK);
            let chunk = &data[offset..offset + len];
            self.drive(chunk, FlushCompress::Sync, None)?;
            remaining -= len;
            if self.protocol >= 31 {
                offset += len;
            }
        }
        Ok(())
    }

    /// Marks the current file as complete.
    pub fn finish(&mut self) -> Result<(), CompressError> {
        self.require_active()?;
        self.state = StreamState::Done;
        Ok(())
    }

    /// Abandons the current file; the next [`begin`](Self::begin) resets.
    pub fn abort(&mut self) {
        if self.state != StreamState::Init {
            self.state = StreamState::Done;
        }
    }

    fn require_active(&self) -> Result<(), CompressError> {
        if self.state.is_active() {
            Ok(())
        } else {
            Err(CompressError::State {
                expected: "an active stream",
                found: self.state,
            })
        }
    }

    fn drive(
        &mut self,
        mut input: &[u8],
        flush: FlushCompress,
        mut out: Option<&mut Vec<u8>>,
    ) -> Result<(), CompressError> {
        loop {
            let before_in = self.stream.total_in();
            let before_out = self.stream.total_out();
            self.stream.compress(input, &mut self.scratch, flush)?;
            let consumed = (self.stream.total_in() - before_in) as usize;
            let produced = (self.stream.total_out() - before_out) as usize;

            if let Some(out) = out.as_deref_mut() {
                out.extend_from_slice(&self.scratch[..produced]);
            }
            input = &input[consumed..];

            if input.is_empty() && produced < self.scratch.len() {
                return Ok(());
            }
            if consumed == 0 && produced == 0 {
                return Ok(());
            }
        }
    }
}

/// Receiver-side decompressor.
pub struct InflateContext {
    stream: Decompress,
    scratch: Vec<u8>,
    state: StreamState,
    protocol: u32,
}

impl std::fmt::Debug for InflateContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InflateContext")
            .field("state", &self.state)
            .field("protocol", &self.protocol)
            .field("total_in", &self.stream.total_in())
            .field("total_out", &self.stream.total_out())
            .finish()
    }
}

impl InflateContext {
    /// Creates a raw-deflate decompressor for a connection speaking
    /// `protocol`.
    #[must_use]
    pub fn new(protocol: u32) -> Self {
        Self {
            stream: Decompress::new(false),
            scratch: Vec::new(),
            state: StreamState::Init,
            protocol,
        }
    }

    /// Current stream state.
    #[must_use]
    pub const fn state(&self) -> StreamState {
        self.state
    }

    /// Prepares the stream for a new file.
    pub fn begin(&mut self) -> Result<(), CompressError> {
        match self.state {
            StreamState::Init => self.scratch.resize(SCRATCH_LEN, 0),
            StreamState::Ready => return Ok(()),
            StreamState::Done => self.stream.reset(false),
            found => {
                return Err(CompressError::State {
                    expected: "a finished or fresh stream",
                    found,
                });
            }
        }
        self.state = StreamState::Ready;
        Ok(())
    }

    /// Inflates a piece of a sync-flushed run, appending plain bytes to
    /// `out`. The run is completed by [`sync`](Self::sync).
    pub fn feed(&mut self, compressed: &[u8], out: &mut Vec<u8>) -> Result<(), CompressError> {
        self.require_active()?;
        self.state = StreamState::Run;
        self.drive(compressed, FlushDecompress::None, Some(out))
    }

    /// Restores the stripped [`SYNC_MARKER`] at the end of a run.
    pub fn sync(&mut self, out: &mut Vec<u8>) -> Result<(), CompressError> {
        self.require_active()?;
        self.drive(&SYNC_MARKER, FlushDecompress::Sync, Some(out))
    }

    /// [`feed`](Self::feed) followed by [`sync`](Self::sync).
    pub fn inflate(&mut self, compressed: &[u8], out: &mut Vec<u8>) -> Result<(), CompressError> {
        self.feed(compressed, out)?;
        self.sync(out)
    }

    /// Inserts matched-block bytes into the history window by feeding them
    /// through a synthetic stored block.
    ///
    /// Mirrors [`DeflateContext::insert`]: before protocol 31 the first
    /// chunk of a long run is repeated instead of advancing.
    pub fn insert(&mut self, data: &[u8]) -> Result<(), CompressError> {
        self.require_active()?;
        self.state = StreamState::Sequence;
        let mut framed = Vec::with_capacity(MAX_INSERT_CHUNK.min(data.len()) + 5);
        let mut remaining = data.len();
        let mut offset = 0;
        while remaining > 0 {
            let len = remaining.min(MAX_INSERT_CHUNK);
            let chunk = &data[offset..offset + len];
            let [lo, hi] = (len as u16).to_le_bytes();
            framed.clear();
            framed.extend_from_slice(&[0x00, lo, hi, !lo, !hi]);
            framed.extend_from_slice(chunk);
            self.drive(&framed, FlushDecompress::Sync, None)?;
            remaining -= len;
            if self.protocol >= 31 {
                offset += len;
            }
        }
        Ok(())
    }

    /// Marks the current file as complete.
    pub fn finish(&mut self) -> Result<(), CompressError> {
        self.require_active()?;
        self.state = StreamState::Done;
        Ok(())
    }

    /// Abandons the current file; the next [`begin`](Self::begin) resets.
    pub fn abort(&mut self) {
        if self.state != StreamState::Init {
            self.state = StreamState::Done;
        }
    }

    fn require_active(&self) -> Result<(), CompressError> {
        if self.state.is_active() {
            Ok(())
        } else {
            Err(CompressError::State {
                expected: "an active stream",
                found: self.state,
            })
        }
    }

    fn drive(
        &mut self,
        mut input: &[u8],
        flush: FlushDecompress,
        mut out: Option<&mut Vec<u8>>,
    ) -> Result<(), CompressError> {
        loop {
            let before_in = self.stream.total_in();
            let before_out = self.stream.total_out();
            self.stream.decompress(input, &mut self.scratch, flush)?;
            let consumed = (self.stream.total_in() - before_in) as usize;
            let produced = (self.stream.total_out() - before_out) as usize;

            if let Some(out) = out.as_deref_mut() {
                out.extend_from_slice(&self.scratch[..produced]);
            }
            input = &input[consumed..];

            if input.is_empty() && produced < self.scratch.len() {
                return Ok(());
            }
            if consumed == 0 && produced == 0 {
                return Err(CompressError::Stalled {
                    remaining: input.len(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (DeflateContext, InflateContext) {
        pair_at(31)
    }

    fn pair_at(protocol: u32) -> (DeflateContext, InflateContext) {
        let mut deflate = DeflateContext::new(CompressionLevel::Default, protocol);
        let mut inflate = InflateContext::new(protocol);
        deflate.begin().expect("begin deflate");
        inflate.begin().expect("begin inflate");
        (deflate, inflate)
    }

    #[test]
    fn literal_chunks_round_trip_and_strip_marker() {
        let (mut deflate, mut inflate) = pair();
        let mut wire = Vec::new();
        deflate.deflate(b"hello hello hello", &mut wire).unwrap();
        assert!(!wire.ends_with(&SYNC_MARKER));
        assert_eq!(deflate.state(), StreamState::Run);

        let mut plain = Vec::new();
        inflate.inflate(&wire, &mut plain).unwrap();
        assert_eq!(plain, b"hello hello hello");
    }

    #[test]
    fn split_runs_share_one_marker() {
        let (mut deflate, mut inflate) = pair();
        let mut wire = Vec::new();
        deflate.feed(b"first half, ", &mut wire).unwrap();
        deflate.feed(b"second half", &mut wire).unwrap();
        deflate.flush(&mut wire).unwrap();

        let (head, tail) = wire.split_at(wire.len() / 2);
        let mut plain = Vec::new();
        inflate.feed(head, &mut plain).unwrap();
        inflate.feed(tail, &mut plain).unwrap();
        inflate.sync(&mut plain).unwrap();
        assert_eq!(plain, b"first half, second half");
    }

    #[test]
    fn inserted_history_is_shared() {
        let (mut deflate, mut inflate) = pair();
        let block = b"a block of bytes the receiver already has on disk".repeat(4);

        deflate.insert(&block).unwrap();
        inflate.insert(&block).unwrap();
        assert_eq!(deflate.state(), StreamState::Sequence);
        assert_eq!(inflate.state(), StreamState::Sequence);

        let mut wire = Vec::new();
        deflate.deflate(&block, &mut wire).unwrap();
        // Back-references into the shared history keep this tiny.
        assert!(wire.len() < block.len() / 4);

        let mut plain = Vec::new();
        inflate.inflate(&wire, &mut plain).unwrap();
        assert_eq!(plain, block);
    }

    #[test]
    fn large_inserts_are_chunked() {
        let (mut deflate, mut inflate) = pair();
        let big: Vec<u8> = (0..200_000u32).map(|i| (i * 7 % 251) as u8).collect();
        deflate.insert(&big).unwrap();
        inflate.insert(&big).unwrap();

        let tail = &big[big.len() - 1000..];
        let mut wire = Vec::new();
        deflate.deflate(tail, &mut wire).unwrap();
        let mut plain = Vec::new();
        inflate.inflate(&wire, &mut plain).unwrap();
        assert_eq!(plain, tail);
    }

    #[test]
    fn old_protocol_long_inserts_stay_in_step() {
        let (mut deflate, mut inflate) = pair_at(29);
        let big: Vec<u8> = (0..150_000u32).map(|i| (i % 239) as u8).collect();
        deflate.insert(&big).unwrap();
        inflate.insert(&big).unwrap();

        let mut wire = Vec::new();
        deflate.deflate(&big[..4096], &mut wire).unwrap();
        let mut plain = Vec::new();
        inflate.inflate(&wire, &mut plain).unwrap();
        assert_eq!(plain, &big[..4096]);
    }

    #[test]
    fn lifecycle_is_enforced() {
        let mut deflate = DeflateContext::new(CompressionLevel::Fast, 29);
        let mut out = Vec::new();
        assert!(matches!(
            deflate.deflate(b"x", &mut out),
            Err(CompressError::State { found: StreamState::Init, .. })
        ));

        deflate.begin().unwrap();
        deflate.deflate(b"x", &mut out).unwrap();
        assert!(deflate.begin().is_err());
        deflate.finish().unwrap();
        assert_eq!(deflate.state(), StreamState::Done);
        assert!(deflate.finish().is_err());
        deflate.begin().unwrap();
        assert_eq!(deflate.state(), StreamState::Ready);
    }

    #[test]
    fn streams_reset_between_files() {
        let (mut deflate, mut inflate) = pair();
        for content in [&b"first file body"[..], &b"second, unrelated"[..]] {
            let mut wire = Vec::new();
            deflate.deflate(content, &mut wire).unwrap();
            let mut plain = Vec::new();
            inflate.inflate(&wire, &mut plain).unwrap();
            assert_eq!(plain, content);
            deflate.finish().unwrap();
            inflate.finish().unwrap();
            deflate.begin().unwrap();
            inflate.begin().unwrap();
        }
    }

    #[test]
    fn corrupt_input_is_an_error() {
        let mut inflate = InflateContext::new(31);
        inflate.begin().unwrap();
        let mut out = Vec::new();
        // BTYPE=11 is reserved and always invalid.
        assert!(inflate.inflate(&[0xff, 0xff, 0xff], &mut out).is_err());
    }
}
