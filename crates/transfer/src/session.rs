//! crates/transfer/src/session.rs
//!
//! One end of a connection after the version handshake.
//!
//! Both directions are unified as [`File`]s over owned descriptors, so a
//! socket pair, a child's pipes, a TCP stream and the process's own
//! stdin/stdout all drive the same [`WireReader`]/[`WireWriter`] pair. The
//! server multiplexes everything it writes; the client demultiplexes
//! everything it reads. Client-to-server traffic is never framed.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::net::TcpStream;
use std::os::fd::{AsFd, OwnedFd};
use std::os::unix::net::UnixStream;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use logging::{DiagnosticEvent, debug_log, drain_events};
use protocol::poll::{Interest, poll_set, set_nonblocking};
use protocol::varint::{read_int, write_int};
use protocol::{
    MessageCode, ProtocolError, ProtocolVersion, WireReader, WireWriter, client_handshake,
    server_handshake,
};
use rsync_core::shutdown_reason;

use crate::error::{TransferError, TransferResult};
use crate::options::Options;

/// Longest single wait in the event loops, so interrupts are noticed.
pub(crate) const POLL_TICK: Duration = Duration::from_millis(500);

/// What this end does with the file data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    /// Walks the sources and sends deltas.
    Sender {
        /// `--append`: only data past the receiver's length is sent.
        append: bool,
    },
    /// Requests files and rebuilds them.
    Receiver {
        /// Pass over the file list: 0 normal, then redo passes.
        phase: u32,
    },
}

impl Role {
    /// Sender role for `options`.
    #[must_use]
    pub const fn sender(options: &Options) -> Self {
        Self::Sender {
            append: options.append,
        }
    }

    /// Receiver role at the first phase.
    #[must_use]
    pub const fn receiver() -> Self {
        Self::Receiver { phase: 0 }
    }

    /// Whether this is the sending role.
    #[must_use]
    pub const fn is_sender(self) -> bool {
        matches!(self, Self::Sender { .. })
    }
}

/// The two raw directions of a connection.
#[derive(Debug)]
pub struct Connection {
    input: File,
    output: File,
}

impl Connection {
    /// Wraps separate read and write descriptors.
    #[must_use]
    pub fn from_fds(input: OwnedFd, output: OwnedFd) -> Self {
        Self {
            input: File::from(input),
            output: File::from(output),
        }
    }

    /// Both directions of a socket.
    pub fn from_unix_stream(stream: UnixStream) -> io::Result<Self> {
        let output = stream.try_clone()?;
        Ok(Self::from_fds(OwnedFd::from(stream), OwnedFd::from(output)))
    }

    /// Both directions of a TCP stream.
    pub fn from_tcp_stream(stream: TcpStream) -> io::Result<Self> {
        let output = stream.try_clone()?;
        Ok(Self::from_fds(OwnedFd::from(stream), OwnedFd::from(output)))
    }

    /// This process's stdin and stdout.
    pub fn stdio() -> io::Result<Self> {
        let input = io::stdin().as_fd().try_clone_to_owned()?;
        let output = io::stdout().as_fd().try_clone_to_owned()?;
        Ok(Self::from_fds(input, output))
    }

    fn into_wire(self, options: &Options) -> io::Result<(WireReader<File>, WireWriter<File>)> {
        set_nonblocking(&self.input)?;
        set_nonblocking(&self.output)?;
        let mut reader = WireReader::new(self.input);
        let mut writer = WireWriter::new(self.output);
        reader.set_timeout(options.timeout);
        writer.set_timeout(options.timeout);
        Ok((reader, writer))
    }
}

/// Picks the checksum seed a server announces.
pub(crate) fn choose_seed(options: &Options) -> i32 {
    if let Some(seed) = options.checksum_seed {
        return seed;
    }
    let mut bytes = [0u8; 4];
    match getrandom::fill(&mut bytes) {
        Ok(()) => i32::from_le_bytes(bytes),
        Err(_) => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs() as i32),
    }
}

/// A negotiated connection plus the counters both roles keep.
pub struct Session<'a> {
    pub(crate) reader: WireReader<File>,
    pub(crate) writer: WireWriter<File>,
    pub(crate) options: &'a Options,
    pub(crate) protocol: ProtocolVersion,
    pub(crate) seed: i32,
    pub(crate) role: Role,
    pub(crate) server: bool,
    pub(crate) errors: u32,
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("protocol", &self.protocol)
            .field("seed", &self.seed)
            .field("role", &self.role)
            .field("server", &self.server)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl<'a> Session<'a> {
    /// Server side: announce our version and seed, then multiplex output.
    pub fn server(conn: Connection, options: &'a Options, role: Role) -> TransferResult<Self> {
        let (mut reader, mut writer) = conn.into_wire(options)?;
        let seed = choose_seed(options);
        let handshake = server_handshake(&mut reader, &mut writer, options.local_protocol(), seed)
            .map_err(handshake_error)?;
        writer.set_multiplexed(true);
        Ok(Self::assemble(reader, writer, options, handshake.protocol, seed, role, true))
    }

    /// Client side over a pipe or socket speaking the binary handshake.
    pub fn client(conn: Connection, options: &'a Options, role: Role) -> TransferResult<Self> {
        let (mut reader, mut writer) = conn.into_wire(options)?;
        let handshake = client_handshake(&mut reader, &mut writer, options.local_protocol())
            .map_err(handshake_error)?;
        reader.set_multiplexed(true);
        Ok(Self::assemble(
            reader,
            writer,
            options,
            handshake.protocol,
            handshake.seed,
            role,
            false,
        ))
    }

    /// Client side after the daemon preamble settled on `protocol`; the
    /// daemon's seed is the next thing on the stream.
    pub fn after_daemon_preamble(
        conn: Connection,
        options: &'a Options,
        role: Role,
        protocol: ProtocolVersion,
    ) -> TransferResult<Self> {
        let (mut reader, writer) = conn.into_wire(options)?;
        let seed = read_int(&mut reader)?;
        reader.set_multiplexed(true);
        Ok(Self::assemble(reader, writer, options, protocol, seed, role, false))
    }

    /// A receiving session fed from a recorded batch instead of a peer.
    pub fn replay(
        recorded: File,
        options: &'a Options,
        protocol: ProtocolVersion,
        seed: i32,
    ) -> TransferResult<Self> {
        let sink = OpenOptions::new()
            .write(true)
            .open("/dev/null")
            .map_err(|err| TransferError::io("open", "/dev/null".as_ref(), err))?;
        let reader = WireReader::new(recorded);
        let writer = WireWriter::new(sink);
        Ok(Self::assemble(reader, writer, options, protocol, seed, Role::receiver(), false))
    }

    fn assemble(
        reader: WireReader<File>,
        writer: WireWriter<File>,
        options: &'a Options,
        protocol: ProtocolVersion,
        seed: i32,
        role: Role,
        server: bool,
    ) -> Self {
        debug_log!(
            Proto,
            1,
            "{} {:?} session at protocol {protocol}, seed {seed}",
            if server { "server" } else { "client" },
            role
        );
        Self {
            reader,
            writer,
            options,
            protocol,
            seed,
            role,
            server,
            errors: 0,
        }
    }

    /// Negotiated protocol.
    #[must_use]
    pub const fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    /// Checksum seed for this session.
    #[must_use]
    pub const fn seed(&self) -> i32 {
        self.seed
    }

    /// This end's role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Whether this end was started with `--server`.
    #[must_use]
    pub const fn is_server(&self) -> bool {
        self.server
    }

    /// Mirrors every data byte read from now on into `tee`.
    pub fn record_into(&mut self, tee: Box<dyn Write + Send>) {
        self.reader.set_tee(Some(tee));
    }

    /// Stops recording and flushes the mirror.
    pub fn stop_recording(&mut self) -> io::Result<()> {
        match self.reader.set_tee(None) {
            Some(mut tee) => tee.flush(),
            None => Ok(()),
        }
    }

    /// Exchanges the (always empty) filter list.
    ///
    /// It travels from client to server whenever the server sends files,
    /// and whenever the server receives with `--delete`.
    pub(crate) fn exchange_filter_list(&mut self) -> TransferResult<()> {
        let server_sends = self.server == self.role.is_sender();
        if !server_sends && !self.options.delete {
            return Ok(());
        }
        if self.server {
            let len = read_int(&mut self.reader)?;
            if len != 0 {
                return Err(ProtocolError::malformed(
                    "filter list",
                    "filter rules are not supported",
                )
                .into());
            }
        } else {
            write_int(&mut self.writer, 0)?;
            self.writer.flush()?;
        }
        Ok(())
    }

    /// Fails once an interrupt has been requested.
    pub(crate) fn check_interrupt(&self) -> TransferResult<()> {
        match shutdown_reason() {
            Some(reason) => Err(TransferError::Interrupted(reason)),
            None => Ok(()),
        }
    }

    /// On the server, sends buffered diagnostics to the client as log
    /// frames.
    pub(crate) fn forward_logs(&mut self) -> TransferResult<()> {
        if !self.server || !self.writer.is_multiplexed() {
            return Ok(());
        }
        for event in drain_events() {
            let code = match &event {
                DiagnosticEvent::Info { .. } | DiagnosticEvent::Debug { .. } => MessageCode::Info,
                DiagnosticEvent::Warning(_) => MessageCode::Warning,
                DiagnosticEvent::Error(_) => MessageCode::Error,
            };
            let mut line = match &event {
                DiagnosticEvent::Debug { .. } => event.to_string(),
                _ => event.message().to_owned(),
            };
            line.push('\n');
            self.writer.write_message(code, line.as_bytes())?;
        }
        Ok(())
    }

    /// Counts a per-file error.
    pub(crate) fn note_error(&mut self) {
        self.errors += 1;
    }

    /// Local errors plus those the peer reported.
    #[must_use]
    pub fn total_errors(&mut self) -> u32 {
        self.errors + self.reader.out_of_band().errors()
    }

    /// Waits until request data is buffered, sending keepalives while idle.
    pub(crate) fn wait_for_input(&mut self) -> TransferResult<()> {
        let mut idle_since = Instant::now();
        while !self.reader.has_buffered_data()? {
            self.check_interrupt()?;
            self.forward_logs()?;
            if self.writer.has_pending() && !self.writer.try_flush()? {
                let ready = {
                    let fd = self.writer.fd();
                    poll_set(&[Interest::write(&fd)], Some(POLL_TICK))?
                };
                if ready.first().is_some_and(|r| r.writable || r.hangup) {
                    idle_since = Instant::now();
                }
                continue;
            }
            let tick = self.options.timeout.map_or(POLL_TICK, |t| (t / 2).min(POLL_TICK));
            let ready = {
                let fd = self.reader.fd();
                poll_set(&[Interest::read(&fd)], Some(tick))?
            };
            if ready.first().is_some_and(|r| r.readable || r.hangup) {
                if self.reader.pump()? > 0 {
                    idle_since = Instant::now();
                }
                continue;
            }
            if let Some(timeout) = self.options.timeout {
                if idle_since.elapsed() >= timeout {
                    return Err(timed_out(timeout).into());
                }
                self.writer.keepalive(timeout / 2)?;
            }
        }
        Ok(())
    }

    /// Best effort: tells the client why the server is giving up.
    pub(crate) fn report_fatal(&mut self, err: &TransferError) {
        if !self.server || !self.writer.is_multiplexed() {
            return;
        }
        let _ = self.forward_logs();
        let message = format!("{err}\n");
        let code = err.exit_code().as_i32();
        let _ = self.writer.write_message(MessageCode::Error, message.as_bytes());
        let _ = self.writer.write_message(MessageCode::ErrorExit, &code.to_le_bytes());
        let _ = self.writer.flush();
    }
}

pub(crate) fn timed_out(timeout: Duration) -> io::Error {
    io::Error::new(
        io::ErrorKind::TimedOut,
        format!("io timeout after {} seconds -- exiting", timeout.as_secs()),
    )
}

fn handshake_error(err: ProtocolError) -> TransferError {
    match err {
        ProtocolError::Incompatible { remote, minimum } => {
            TransferError::Incompatible { remote, minimum }
        }
        other => TransferError::Protocol(other),
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn pair() -> (Connection, Connection) {
        let (a, b) = UnixStream::pair().unwrap();
        (
            Connection::from_unix_stream(a).unwrap(),
            Connection::from_unix_stream(b).unwrap(),
        )
    }

    #[test]
    fn handshake_agrees_on_seed_and_version() {
        let (client_end, server_end) = pair();
        let server_options = Options {
            checksum_seed: Some(4321),
            ..Options::default()
        };
        let server = thread::spawn(move || {
            let role = Role::sender(&server_options);
            let session = Session::server(server_end, &server_options, role).unwrap();
            (session.protocol(), session.seed())
        });
        let client_options = Options {
            protocol: Some(28),
            ..Options::default()
        };
        let client = Session::client(client_end, &client_options, Role::receiver()).unwrap();
        let (server_protocol, server_seed) = server.join().unwrap();
        assert_eq!(client.protocol().as_u32(), 28);
        assert_eq!(server_protocol.as_u32(), 28);
        assert_eq!(client.seed(), 4321);
        assert_eq!(server_seed, 4321);
        assert!(!client.is_server());
    }

    #[test]
    fn filter_list_travels_when_server_sends() {
        let (client_end, server_end) = pair();
        let options = Options::default();
        let server = thread::spawn(move || {
            let options = Options::default();
            let mut session =
                Session::server(server_end, &options, Role::sender(&options)).unwrap();
            session.exchange_filter_list().unwrap();
        });
        let mut client = Session::client(client_end, &options, Role::receiver()).unwrap();
        client.exchange_filter_list().unwrap();
        server.join().unwrap();
    }

    #[test]
    fn server_logs_arrive_as_frames() {
        let (client_end, server_end) = pair();
        let server = thread::spawn(move || {
            let options = Options::default();
            let mut session =
                Session::server(server_end, &options, Role::sender(&options)).unwrap();
            logging::clear_sink();
            drain_events();
            logging::warn_log!("disk nearly full");
            session.forward_logs().unwrap();
            write_int(&mut session.writer, 7).unwrap();
            session.writer.flush().unwrap();
        });
        let options = Options::default();
        let mut client = Session::client(client_end, &options, Role::receiver()).unwrap();
        logging::clear_sink();
        drain_events();
        assert_eq!(read_int(&mut client.reader).unwrap(), 7);
        server.join().unwrap();
        let events = drain_events();
        assert!(events.contains(&DiagnosticEvent::Warning("disk nearly full".into())));
    }

    #[test]
    fn explicit_seed_wins() {
        let options = Options {
            checksum_seed: Some(-9),
            ..Options::default()
        };
        assert_eq!(choose_seed(&options), -9);
    }
}
