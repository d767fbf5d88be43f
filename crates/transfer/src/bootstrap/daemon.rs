//! crates/transfer/src/bootstrap/daemon.rs
//!
//! `rsync://` and `host::module` operands: a TCP connection, the text
//! preamble, then the binary protocol with the daemon as server.

use std::net::TcpStream;

use logging::debug_log;
use protocol::ProtocolVersion;
use protocol::legacy::{DaemonRequest, daemon_client_exchange};

use crate::error::{TransferError, TransferResult};
use crate::options::Options;
use crate::session::Connection;

/// Where and as whom to connect.
#[derive(Clone, Copy, Debug)]
pub(super) struct DaemonTarget<'a> {
    pub user: Option<&'a str>,
    pub host: &'a str,
    pub port: u16,
    pub module: &'a str,
}

/// Connects, runs the preamble and sends `args`.
///
/// Returns the connection positioned at the daemon's checksum seed, and
/// the protocol both ends settled on.
pub(super) fn connect(
    options: &Options,
    target: DaemonTarget<'_>,
    args: &[String],
) -> TransferResult<(Connection, ProtocolVersion)> {
    debug_log!(Connect, 1, "connecting to {}:{}", target.host, target.port);
    let mut stream = TcpStream::connect((target.host, target.port)).map_err(|err| {
        let what = format!("failed to connect to {}:{}", target.host, target.port);
        TransferError::ipc(what, err)
    })?;
    if let Some(timeout) = options.timeout {
        stream
            .set_read_timeout(Some(timeout))
            .map_err(|err| TransferError::ipc("set socket timeout", err))?;
    }

    let login = target
        .user
        .map(str::to_owned)
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "nobody".to_owned());
    let request = DaemonRequest {
        module: target.module,
        user: &login,
        password: options.password.as_deref().map(str::as_bytes),
        args,
        protocol: options.local_protocol(),
    };
    let protocol = daemon_client_exchange(&mut stream, &request)?;
    stream
        .set_read_timeout(None)
        .map_err(|err| TransferError::ipc("set socket timeout", err))?;
    let conn =
        Connection::from_tcp_stream(stream).map_err(|err| TransferError::ipc("socket", err))?;
    Ok((conn, protocol))
}
