//! crates/transfer/src/bootstrap/remote.rs
//!
//! Remote-shell transport: the far side runs `--server` under `ssh` (or
//! whatever `-e` names) and the protocol flows over the child's stdio.

use std::io;
use std::os::fd::OwnedFd;
use std::process::{Child, Command, Stdio};

use logging::debug_log;
use protocol::ProtocolError;

use crate::error::{TransferError, TransferResult};
use crate::options::Options;
use crate::session::Connection;

const DEFAULT_SHELL: &str = "ssh";
const DEFAULT_RSYNC_PATH: &str = "rsync";

/// A running remote-shell child.
#[derive(Debug)]
pub(super) struct RemoteShell {
    child: Child,
}

impl RemoteShell {
    /// Spawns the remote shell and returns the connection to its stdio.
    pub(super) fn spawn(
        options: &Options,
        user: Option<&str>,
        host: &str,
        args: &[String],
    ) -> TransferResult<(Connection, Self)> {
        let mut command = remote_command(options, user, host, args)?;
        debug_log!(Connect, 1, "running {command:?}");
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| {
                TransferError::ipc(format!("failed to spawn {:?}", command.get_program()), err)
            })?;
        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let missing = io::Error::other("child stdio is missing");
            return Err(TransferError::ipc("remote shell", missing));
        };
        let conn = Connection::from_fds(OwnedFd::from(stdout), OwnedFd::from(stdin));
        Ok((conn, Self { child }))
    }

    /// Reaps the child. A clean transfer still fails when the remote
    /// process exits non-zero.
    pub(super) fn finish(mut self, result: TransferResult<()>) -> TransferResult<()> {
        let status = self
            .child
            .wait()
            .map_err(|err| TransferError::ipc("waitpid", err))?;
        debug_log!(Exit, 1, "remote shell exited with {status}");
        match (result, status.code()) {
            (Ok(()), Some(0)) => Ok(()),
            (Ok(()), Some(code)) => Err(TransferError::Protocol(ProtocolError::RemoteExit(code))),
            (Ok(()), None) => Err(TransferError::ipc(
                "remote shell",
                io::Error::other(format!("terminated by {status}")),
            )),
            (Err(err), _) => Err(err),
        }
    }
}

/// `<shell words> [-l user] <host> <rsync_path> <args...>`.
fn remote_command(
    options: &Options,
    user: Option<&str>,
    host: &str,
    args: &[String],
) -> TransferResult<Command> {
    let shell = options.remote_shell.as_deref().unwrap_or(DEFAULT_SHELL);
    let mut words = shell.split_whitespace();
    let Some(program) = words.next() else {
        return Err(TransferError::Usage("the remote shell command is empty".into()));
    };
    let mut command = Command::new(program);
    command.args(words);
    if let Some(user) = user {
        command.args(["-l", user]);
    }
    command.arg(host);
    let rsync_path = options.rsync_path.as_deref().unwrap_or(DEFAULT_RSYNC_PATH);
    command.args(rsync_path.split_whitespace());
    command.args(args);
    Ok(command)
}
