use std::io::{self, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::time::{Duration, Instant};

use super::MAX_CHUNK;
use crate::envelope::{MAX_PAYLOAD_LENGTH, MessageCode, MessageHeader};
use crate::error::ProtocolError;
use crate::poll::wait_writable;

/// When buffered output reaches the descriptor.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum WriteMode {
    /// Every full chunk is written out before `write` returns.
    #[default]
    Blocking,
    /// Output only leaves on [`WireWriter::flush`] or
    /// [`WireWriter::try_flush`]; used by poll loops that must never block
    /// on a write.
    Deferred,
}

/// Write half of a connection.
///
/// Payload is buffered until a chunk of [`MAX_CHUNK`] bytes accumulates or
/// the caller flushes; with multiplexing on, each chunk leaves as one
/// `MSG_DATA` frame. Out-of-band messages frame any pending payload first
/// so ordering on the wire matches call order.
pub struct WireWriter<W> {
    inner: W,
    pending: Vec<u8>,
    out: Vec<u8>,
    out_pos: usize,
    multiplexed: bool,
    mode: WriteMode,
    timeout: Option<Duration>,
    bytes_written: u64,
    last_activity: Instant,
}

impl<W> std::fmt::Debug for WireWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireWriter")
            .field("pending", &self.pending.len())
            .field("queued", &(self.out.len() - self.out_pos))
            .field("multiplexed", &self.multiplexed)
            .field("mode", &self.mode)
            .field("bytes_written", &self.bytes_written)
            .finish_non_exhaustive()
    }
}

impl<W: Write + AsFd> WireWriter<W> {
    /// Wraps `inner` with multiplexing off, blocking mode, no timeout.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            pending: Vec::with_capacity(MAX_CHUNK),
            out: Vec::new(),
            out_pos: 0,
            multiplexed: false,
            mode: WriteMode::Blocking,
            timeout: None,
            bytes_written: 0,
            last_activity: Instant::now(),
        }
    }

    /// Switches multiplexing on or off. Pending payload is framed under the
    /// old setting first.
    pub fn set_multiplexed(&mut self, on: bool) {
        self.frame_pending();
        self.multiplexed = on;
    }

    /// Whether output is multiplexed.
    #[must_use]
    pub const fn is_multiplexed(&self) -> bool {
        self.multiplexed
    }

    /// Selects blocking or deferred output.
    pub fn set_mode(&mut self, mode: WriteMode) {
        self.mode = mode;
    }

    /// Bounds every blocking wait; `None` waits forever.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Payload bytes accepted so far.
    #[must_use]
    pub const fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Borrowed descriptor, for poll sets.
    pub fn fd(&self) -> BorrowedFd<'_> {
        self.inner.as_fd()
    }

    /// Whether anything is waiting to reach the descriptor.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty() || self.out_pos < self.out.len()
    }

    /// Bytes accepted but not yet written to the descriptor, framing
    /// included.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.pending.len() + (self.out.len() - self.out_pos)
    }

    /// Sends an out-of-band message.
    ///
    /// Fails with [`io::ErrorKind::Unsupported`] when multiplexing is off.
    pub fn write_message(&mut self, code: MessageCode, payload: &[u8]) -> io::Result<()> {
        if !self.multiplexed {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("cannot send {code} on a plain stream"),
            ));
        }
        let len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        let header = MessageHeader::new(code, len.min(MAX_PAYLOAD_LENGTH + 1))
            .map_err(ProtocolError::from)?;
        self.frame_pending();
        self.out.extend_from_slice(&header.encode());
        self.out.extend_from_slice(payload);
        if self.mode == WriteMode::Blocking {
            self.drain()?;
        }
        Ok(())
    }

    /// Sends a keepalive when multiplexed and idle for at least `idle`.
    ///
    /// Returns whether one was sent.
    pub fn keepalive(&mut self, idle: Duration) -> io::Result<bool> {
        if !self.multiplexed || self.has_pending() || self.last_activity.elapsed() < idle {
            return Ok(false);
        }
        self.write_message(MessageCode::NoOp, &[])?;
        self.drain()?;
        Ok(true)
    }

    /// Writes as much queued output as the descriptor accepts without
    /// blocking. Returns `true` once everything has been written.
    pub fn try_flush(&mut self) -> io::Result<bool> {
        self.frame_pending();
        while self.out_pos < self.out.len() {
            match self.inner.write(&self.out[self.out_pos..]) {
                Ok(0) => return Err(write_zero()),
                Ok(n) => self.advance(n),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        self.reset_out();
        Ok(true)
    }

    fn frame_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        if self.multiplexed {
            for chunk in self.pending.chunks(MAX_CHUNK) {
                let header = MessageHeader::new(MessageCode::Data, chunk.len() as u32);
                // MAX_CHUNK is far below the 24-bit limit.
                if let Ok(header) = header {
                    self.out.extend_from_slice(&header.encode());
                }
                self.out.extend_from_slice(chunk);
            }
        } else {
            self.out.extend_from_slice(&self.pending);
        }
        self.pending.clear();
    }

    fn drain(&mut self) -> io::Result<()> {
        while self.out_pos < self.out.len() {
            match self.inner.write(&self.out[self.out_pos..]) {
                Ok(0) => return Err(write_zero()),
                Ok(n) => self.advance(n),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    wait_writable(&self.inner, self.timeout)?;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        self.reset_out();
        Ok(())
    }

    fn advance(&mut self, n: usize) {
        self.out_pos += n;
        self.last_activity = Instant::now();
    }

    fn reset_out(&mut self) {
        self.out.clear();
        self.out_pos = 0;
    }

    /// Consumes the wrapper after flushing, returning the descriptor.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.flush()?;
        Ok(self.inner)
    }
}

fn write_zero() -> io::Error {
    io::Error::new(io::ErrorKind::WriteZero, "peer stopped accepting data")
}

impl<W: Write + AsFd> Write for WireWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.bytes_written += buf.len() as u64;
        if self.pending.len() >= MAX_CHUNK {
            self.frame_pending();
            if self.mode == WriteMode::Blocking {
                self.drain()?;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.frame_pending();
        self.drain()?;
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::os::unix::net::UnixStream;

    use super::*;
    use crate::envelope::{HEADER_LEN, MessageHeader};
    use crate::multiplex::WireReader;
    use crate::varint::{read_int, write_int};

    #[test]
    fn plain_output_is_unframed() {
        let (tx, mut rx) = UnixStream::pair().unwrap();
        let mut writer = WireWriter::new(tx);
        write_int(&mut writer, 0x0102_0304).unwrap();
        writer.flush().unwrap();
        let mut buf = [0u8; 4];
        rx.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [4, 3, 2, 1]);
    }

    #[test]
    fn multiplexed_output_is_framed() {
        let (tx, mut rx) = UnixStream::pair().unwrap();
        let mut writer = WireWriter::new(tx);
        writer.set_multiplexed(true);
        writer.write_all(b"abc").unwrap();
        writer.write_message(MessageCode::Info, b"log\n").unwrap();
        writer.flush().unwrap();
        drop(writer);

        let mut raw = Vec::new();
        rx.read_to_end(&mut raw).unwrap();
        let first = MessageHeader::decode(&raw).unwrap();
        assert_eq!(first.code(), MessageCode::Data);
        assert_eq!(&raw[HEADER_LEN..HEADER_LEN + 3], b"abc");
        let second = MessageHeader::decode(&raw[HEADER_LEN + 3..]).unwrap();
        assert_eq!(second.code(), MessageCode::Info);
        assert_eq!(second.payload_len(), 4);
    }

    #[test]
    fn large_writes_split_into_chunks() {
        let (tx, rx) = UnixStream::pair().unwrap();
        let payload: Vec<u8> = (0..MAX_CHUNK * 3 + 17).map(|i| i as u8).collect();
        let expected = payload.clone();
        let handle = std::thread::spawn(move || {
            let mut writer = WireWriter::new(tx);
            writer.set_multiplexed(true);
            writer.write_all(&payload).unwrap();
            writer.flush().unwrap();
        });
        let mut reader = WireReader::new(rx);
        reader.set_multiplexed(true);
        let mut got = vec![0u8; expected.len()];
        reader.read_exact(&mut got).unwrap();
        handle.join().unwrap();
        assert_eq!(got, expected);
    }

    #[test]
    fn deferred_mode_waits_for_flush() {
        let (tx, rx) = UnixStream::pair().unwrap();
        crate::poll::set_nonblocking(&tx).unwrap();
        crate::poll::set_nonblocking(&rx).unwrap();
        let mut writer = WireWriter::new(tx);
        writer.set_mode(WriteMode::Deferred);
        writer.write_all(&vec![1u8; MAX_CHUNK * 2]).unwrap();
        assert!(writer.has_pending());

        let mut reader = WireReader::new(rx);
        assert_eq!(reader.pump().unwrap(), 0);

        while !writer.try_flush().unwrap() {
            let mut sink = vec![0u8; MAX_CHUNK];
            let _ = reader.read(&mut sink).unwrap();
        }
        assert!(!writer.has_pending());
        assert_eq!(writer.queued_len(), 0);
    }

    #[test]
    fn queued_len_counts_frame_headers() {
        let (tx, _rx) = UnixStream::pair().unwrap();
        let mut writer = WireWriter::new(tx);
        writer.set_mode(WriteMode::Deferred);
        writer.set_multiplexed(true);
        writer.write_all(&[0u8; 10]).unwrap();
        assert_eq!(writer.queued_len(), 10);
        writer.write_all(&vec![0u8; MAX_CHUNK]).unwrap();
        assert_eq!(writer.queued_len(), MAX_CHUNK + 10 + HEADER_LEN * 2);
    }

    #[test]
    fn messages_need_multiplexing() {
        let (tx, _rx) = UnixStream::pair().unwrap();
        let mut writer = WireWriter::new(tx);
        let err = writer.write_message(MessageCode::Info, b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn keepalive_only_when_idle() {
        let (tx, rx) = UnixStream::pair().unwrap();
        let mut writer = WireWriter::new(tx);
        writer.set_multiplexed(true);
        assert!(!writer.keepalive(Duration::from_secs(3600)).unwrap());
        assert!(writer.keepalive(Duration::ZERO).unwrap());
        write_int(&mut writer, 9).unwrap();
        writer.flush().unwrap();

        let mut reader = WireReader::new(rx);
        reader.set_multiplexed(true);
        assert_eq!(read_int(&mut reader).unwrap(), 9);
        assert_eq!(reader.out_of_band().frames(), 1);
    }
}
