//! crates/transfer/src/bootstrap/local.rs
//!
//! Local copies: the sender runs as a server on a second thread, joined to
//! the receiving client by a socket pair.

use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use logging::debug_log;

use super::run_server_role;
use crate::error::{TransferError, TransferResult};
use crate::options::Options;
use crate::session::{Connection, Role, Session};

/// The sending half of a local transfer.
pub(super) struct LocalSender {
    handle: JoinHandle<TransferResult<()>>,
}

impl LocalSender {
    /// Starts a sender over `sources` and returns the client's end of the
    /// connection.
    pub(super) fn spawn(
        options: &Options,
        sources: Vec<PathBuf>,
    ) -> TransferResult<(Connection, Self)> {
        let (ours, theirs) = UnixStream::pair().map_err(socketpair)?;
        let server_options = options.clone();
        let verbosity = logging::current();
        let handle = thread::Builder::new()
            .name("orsync-sender".into())
            .spawn(move || {
                logging::init(verbosity);
                let conn = Connection::from_unix_stream(theirs).map_err(socketpair)?;
                let role = Role::sender(&server_options);
                let mut session = Session::server(conn, &server_options, role)?;
                run_server_role(&mut session, &sources)
            })
            .map_err(|err| TransferError::ipc("spawn sender thread", err))?;
        let conn = Connection::from_unix_stream(ours).map_err(socketpair)?;
        Ok((conn, Self { handle }))
    }

    /// Waits for the sender and merges its result with the client's.
    ///
    /// The client's connection must already be closed, or a sender still
    /// waiting for its goodbye never returns.
    pub(super) fn join(self, client: TransferResult<()>) -> TransferResult<()> {
        let server = match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(TransferError::ipc(
                "sender thread",
                std::io::Error::other("the sender thread panicked"),
            )),
        };
        debug_log!(Exit, 1, "local sender finished: {:?}", server.as_ref().map(|()| "ok"));
        match (client, server) {
            (Ok(()), server) => server,
            // A client that lost its peer reports a hangup; the sender knows
            // why.
            (Err(TransferError::Protocol(_)), Err(server)) => Err(server),
            (Err(client), _) => Err(client),
        }
    }
}

fn socketpair(err: std::io::Error) -> TransferError {
    TransferError::ipc("socketpair", err)
}
