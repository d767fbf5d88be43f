use std::io::{self, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::time::Duration;

use super::oob::OutOfBand;
use crate::envelope::{HEADER_LEN, MessageCode, MessageHeader};
use crate::error::ProtocolError;
use crate::iobuf::IoBuf;
use crate::poll::wait_readable;

/// Read half of a connection.
///
/// Raw bytes are read ahead into an [`IoBuf`]. When multiplexing is on,
/// frame headers are parsed out of that buffer: the current `MSG_DATA`
/// frame's bytes are exposed through [`Read`], [`peek`](Self::peek) and
/// [`consume`](Self::consume), and every other frame is handed to the
/// [`OutOfBand`] handler as soon as it is complete. A read never crosses
/// into the next frame's header.
///
/// Blocking reads wait with `poll(2)` bounded by the configured timeout,
/// so the descriptor may be non-blocking.
pub struct WireReader<R> {
    inner: R,
    buf: IoBuf,
    multiplexed: bool,
    frame_left: usize,
    timeout: Option<Duration>,
    bytes_read: u64,
    tee: Option<Box<dyn Write + Send>>,
    oob: OutOfBand,
}

impl<R> std::fmt::Debug for WireReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireReader")
            .field("buffered", &self.buf.len())
            .field("multiplexed", &self.multiplexed)
            .field("frame_left", &self.frame_left)
            .field("bytes_read", &self.bytes_read)
            .finish_non_exhaustive()
    }
}

impl<R: Read + AsFd> WireReader<R> {
    /// Wraps `inner` with multiplexing off and no timeout.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: IoBuf::default(),
            multiplexed: false,
            frame_left: 0,
            timeout: None,
            bytes_read: 0,
            tee: None,
            oob: OutOfBand::default(),
        }
    }

    /// Switches demultiplexing on or off. Takes effect at the next byte.
    pub fn set_multiplexed(&mut self, on: bool) {
        self.multiplexed = on;
    }

    /// Whether incoming bytes are demultiplexed.
    #[must_use]
    pub const fn is_multiplexed(&self) -> bool {
        self.multiplexed
    }

    /// Bounds every blocking wait; `None` waits forever.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Mirrors every consumed data byte into `tee`, returning the previous
    /// mirror so the caller can flush it.
    pub fn set_tee(&mut self, tee: Option<Box<dyn Write + Send>>) -> Option<Box<dyn Write + Send>> {
        std::mem::replace(&mut self.tee, tee)
    }

    /// Data bytes consumed so far.
    #[must_use]
    pub const fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Out-of-band state.
    pub fn out_of_band(&mut self) -> &mut OutOfBand {
        &mut self.oob
    }

    /// Borrowed descriptor, for poll sets.
    pub fn fd(&self) -> BorrowedFd<'_> {
        self.inner.as_fd()
    }

    /// Whether data bytes are already buffered, so a caller's poll loop
    /// must not wait on the descriptor.
    ///
    /// Complete frame headers sitting in the buffer are parsed first, so
    /// a frame that arrived together with the previous one counts.
    pub fn has_buffered_data(&mut self) -> io::Result<bool> {
        self.settle()?;
        Ok(self.data_len() > 0)
    }

    /// Reads whatever the descriptor has without blocking and processes
    /// any complete out-of-band frames.
    ///
    /// Call after `poll(2)` reported the descriptor readable. Returns the
    /// number of raw bytes read; end of stream is an error.
    pub fn pump(&mut self) -> io::Result<usize> {
        let n = match self.buf.fill_from(&mut self.inner) {
            Ok(0) => return Err(hangup()),
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => 0,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => 0,
            Err(err) => return Err(err),
        };
        self.settle()?;
        Ok(n)
    }

    /// Returns the buffered bytes of the current data frame, blocking until
    /// at least one is available. Nothing is consumed.
    pub fn peek(&mut self) -> io::Result<&[u8]> {
        self.require_data()?;
        let len = self.data_len();
        Ok(&self.buf.peek()[..len])
    }

    /// Consumes `n` bytes previously returned by [`peek`](Self::peek).
    pub fn consume(&mut self, n: usize) -> io::Result<()> {
        if n > self.data_len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "consume past buffered data",
            ));
        }
        if let Some(tee) = self.tee.as_mut() {
            tee.write_all(&self.buf.peek()[..n])?;
        }
        self.buf.consume(n);
        self.bytes_read += n as u64;
        if self.multiplexed {
            self.frame_left -= n;
            if self.frame_left == 0 {
                self.settle()?;
            }
        }
        Ok(())
    }

    fn data_len(&self) -> usize {
        if self.multiplexed {
            self.frame_left.min(self.buf.len())
        } else {
            self.buf.len()
        }
    }

    /// Blocks until at least one data byte is buffered.
    fn require_data(&mut self) -> io::Result<()> {
        loop {
            self.settle()?;
            if self.data_len() > 0 {
                return Ok(());
            }
            self.fill_blocking()?;
        }
    }

    /// Parses complete frame headers at the front of the buffer.
    fn settle(&mut self) -> io::Result<()> {
        if !self.multiplexed {
            return Ok(());
        }
        while self.frame_left == 0 && self.buf.len() >= HEADER_LEN {
            let header = MessageHeader::decode(self.buf.peek()).map_err(ProtocolError::from)?;
            let len = header.payload_len();
            if header.code() == MessageCode::Data {
                self.buf.consume(HEADER_LEN);
                self.frame_left = len;
                continue;
            }
            if self.buf.len() < HEADER_LEN + len {
                self.buf.reserve(HEADER_LEN + len - self.buf.len());
                break;
            }
            let payload = self.buf.peek()[HEADER_LEN..HEADER_LEN + len].to_vec();
            self.buf.consume(HEADER_LEN + len);
            self.oob.handle(header.code(), &payload)?;
        }
        Ok(())
    }

    fn fill_blocking(&mut self) -> io::Result<()> {
        loop {
            match self.buf.fill_from(&mut self.inner) {
                Ok(0) => return Err(hangup()),
                Ok(_) => return Ok(()),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    wait_readable(&self.inner, self.timeout)?;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
    }

    /// Consumes the wrapper, returning the descriptor and any unread bytes.
    pub fn into_parts(self) -> (R, Vec<u8>) {
        (self.inner, self.buf.peek().to_vec())
    }
}

fn hangup() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed by peer")
}

impl<R: Read + AsFd> Read for WireReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        self.require_data()?;
        let n = self.data_len().min(out.len());
        out[..n].copy_from_slice(&self.buf.peek()[..n]);
        self.consume(n)?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::os::unix::net::UnixStream;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::envelope::MessageHeader;
    use crate::varint::{read_int, read_longint};

    fn frame(code: MessageCode, payload: &[u8]) -> Vec<u8> {
        let mut out = MessageHeader::new(code, payload.len() as u32)
            .unwrap()
            .encode()
            .to_vec();
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn plain_stream_passes_through() {
        let (mut tx, rx) = UnixStream::pair().unwrap();
        tx.write_all(&7i32.to_le_bytes()).unwrap();
        tx.write_all(&(-1i32).to_le_bytes()).unwrap();
        tx.write_all(&(1i64 << 40).to_le_bytes()).unwrap();
        let mut reader = WireReader::new(rx);
        assert_eq!(read_int(&mut reader).unwrap(), 7);
        assert_eq!(read_longint(&mut reader).unwrap(), 1 << 40);
        assert_eq!(reader.bytes_read(), 16);
    }

    #[test]
    fn data_frames_are_stitched_and_oob_handled() {
        let (mut tx, rx) = UnixStream::pair().unwrap();
        tx.write_all(&frame(MessageCode::Data, b"he")).unwrap();
        tx.write_all(&frame(MessageCode::Redo, &5i32.to_le_bytes())).unwrap();
        tx.write_all(&frame(MessageCode::Data, b"llo")).unwrap();

        let mut reader = WireReader::new(rx);
        reader.set_multiplexed(true);
        let mut out = [0u8; 5];
        reader.read_exact(&mut out).unwrap();
        assert_eq!(&out, b"hello");
        assert_eq!(
            reader.out_of_band().pop(),
            Some(super::super::ControlMessage::Redo(5))
        );
    }

    #[test]
    fn peek_stops_at_frame_boundary() {
        let (mut tx, rx) = UnixStream::pair().unwrap();
        let mut bytes = frame(MessageCode::Data, b"abc");
        bytes.extend(frame(MessageCode::Data, b"def"));
        tx.write_all(&bytes).unwrap();

        let mut reader = WireReader::new(rx);
        reader.set_multiplexed(true);
        assert_eq!(reader.peek().unwrap(), b"abc");
        reader.consume(3).unwrap();
        assert_eq!(reader.peek().unwrap(), b"def");
        assert!(reader.consume(4).is_err());
    }

    #[test]
    fn unknown_tag_is_a_framing_error() {
        let (mut tx, rx) = UnixStream::pair().unwrap();
        tx.write_all(&[0, 0, 0, 3]).unwrap();
        let mut reader = WireReader::new(rx);
        reader.set_multiplexed(true);
        let err = read_int(&mut reader).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn hangup_mid_read_is_eof() {
        let (mut tx, rx) = UnixStream::pair().unwrap();
        tx.write_all(&[1, 2]).unwrap();
        drop(tx);
        let mut reader = WireReader::new(rx);
        assert_eq!(
            read_int(&mut reader).unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );
    }

    #[test]
    fn timeout_is_reported() {
        let (_tx, rx) = UnixStream::pair().unwrap();
        crate::poll::set_nonblocking(&rx).unwrap();
        let mut reader = WireReader::new(rx);
        reader.set_timeout(Some(Duration::from_millis(20)));
        assert_eq!(
            read_int(&mut reader).unwrap_err().kind(),
            io::ErrorKind::TimedOut
        );
    }

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn tee_sees_only_data() {
        let (mut tx, rx) = UnixStream::pair().unwrap();
        tx.write_all(&frame(MessageCode::Info, b"noise")).unwrap();
        tx.write_all(&frame(MessageCode::Data, b"signal")).unwrap();
        let shared = Shared::default();
        let mut reader = WireReader::new(rx);
        reader.set_multiplexed(true);
        reader.set_tee(Some(Box::new(shared.clone())));
        let mut out = [0u8; 6];
        reader.read_exact(&mut out).unwrap();
        assert_eq!(&*shared.0.lock().unwrap(), b"signal");
    }

    #[test]
    fn pump_handles_oob_without_blocking() {
        let (mut tx, rx) = UnixStream::pair().unwrap();
        crate::poll::set_nonblocking(&rx).unwrap();
        let mut reader = WireReader::new(rx);
        reader.set_multiplexed(true);
        assert_eq!(reader.pump().unwrap(), 0);
        tx.write_all(&frame(MessageCode::NoOp, b"")).unwrap();
        crate::poll::wait_readable(&reader.fd(), Some(Duration::from_secs(5))).unwrap();
        reader.pump().unwrap();
        assert!(!reader.has_buffered_data().unwrap());
        assert_eq!(reader.out_of_band().frames(), 1);
    }

    #[test]
    fn back_to_back_frames_stay_visible_to_the_poll_loop() {
        let (mut tx, rx) = UnixStream::pair().unwrap();
        crate::poll::set_nonblocking(&rx).unwrap();
        let mut bytes = frame(MessageCode::Data, &7i32.to_le_bytes());
        bytes.extend(frame(MessageCode::Info, b"between"));
        bytes.extend(frame(MessageCode::Data, &(-1i32).to_le_bytes()));
        tx.write_all(&bytes).unwrap();

        let mut reader = WireReader::new(rx);
        reader.set_multiplexed(true);
        crate::poll::wait_readable(&reader.fd(), Some(Duration::from_secs(5))).unwrap();
        assert_eq!(reader.pump().unwrap(), bytes.len());
        assert_eq!(read_int(&mut reader).unwrap(), 7);

        // The descriptor is drained; the second frame is only in the buffer.
        assert!(reader.has_buffered_data().unwrap());
        assert_eq!(reader.out_of_band().frames(), 1);
        assert_eq!(read_int(&mut reader).unwrap(), -1);
        assert!(!reader.has_buffered_data().unwrap());
    }

    #[test]
    fn headers_buffered_before_multiplexing_are_parsed() {
        let (mut tx, rx) = UnixStream::pair().unwrap();
        crate::poll::set_nonblocking(&rx).unwrap();
        let mut bytes = 29i32.to_le_bytes().to_vec();
        bytes.extend(frame(MessageCode::Data, b"x"));
        tx.write_all(&bytes).unwrap();

        let mut reader = WireReader::new(rx);
        crate::poll::wait_readable(&reader.fd(), Some(Duration::from_secs(5))).unwrap();
        reader.pump().unwrap();
        assert_eq!(read_int(&mut reader).unwrap(), 29);
        reader.set_multiplexed(true);
        assert!(reader.has_buffered_data().unwrap());
        assert_eq!(reader.peek().unwrap(), b"x");
    }
}
