//! crates/core/src/exit_code.rs
//!
//! Process exit codes and their descriptions.

use std::fmt;
use std::io;

/// Exit status of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ExitCode {
    /// Successful completion.
    Ok = 0,
    /// Syntax or usage error.
    Syntax = 1,
    /// Protocol incompatibility or violation.
    Protocol = 2,
    /// Errors selecting input/output files or directories.
    FileSelect = 3,
    /// Requested action not supported.
    Unsupported = 4,
    /// Error starting the client-server protocol.
    StartClient = 5,
    /// Error in socket I/O.
    SocketIo = 10,
    /// Error in file I/O.
    FileIo = 11,
    /// Error in the protocol data stream.
    StreamIo = 12,
    /// Errors with program diagnostics.
    MessageIo = 13,
    /// Error in IPC code.
    Ipc = 14,
    /// Interrupted by SIGINT, SIGTERM or SIGHUP.
    Signal = 20,
    /// Some files could not be transferred.
    PartialTransfer = 23,
    /// Some source files vanished before they could be transferred.
    Vanished = 24,
    /// `--max-delete` stopped deletions.
    DeleteLimit = 25,
    /// Timeout in data send/receive.
    Timeout = 30,
}

impl ExitCode {
    const ALL: [Self; 16] = [
        Self::Ok,
        Self::Syntax,
        Self::Protocol,
        Self::FileSelect,
        Self::Unsupported,
        Self::StartClient,
        Self::SocketIo,
        Self::FileIo,
        Self::StreamIo,
        Self::MessageIo,
        Self::Ipc,
        Self::Signal,
        Self::PartialTransfer,
        Self::Vanished,
        Self::DeleteLimit,
        Self::Timeout,
    ];

    /// The numeric status.
    ///
    /// ```
    /// use rsync_core::ExitCode;
    ///
    /// assert_eq!(ExitCode::PartialTransfer.as_i32(), 23);
    /// ```
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// The message printed beside the status.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Ok => "success",
            Self::Syntax => "syntax or usage error",
            Self::Protocol => "protocol incompatibility",
            Self::FileSelect => "errors selecting input/output files, dirs",
            Self::Unsupported => "requested action not supported",
            Self::StartClient => "error starting client-server protocol",
            Self::SocketIo => "error in socket IO",
            Self::FileIo => "error in file IO",
            Self::StreamIo => "error in rsync protocol data stream",
            Self::MessageIo => "errors with program diagnostics",
            Self::Ipc => "error in IPC code",
            Self::Signal => "received SIGINT, SIGTERM, or SIGHUP",
            Self::PartialTransfer => "some files/attrs were not transferred (see previous errors)",
            Self::Vanished => "some files vanished before they could be transferred",
            Self::DeleteLimit => "the --max-delete limit stopped deletions",
            Self::Timeout => "timeout in data send/receive",
        }
    }

    /// Whether the run succeeded.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Looks up a numeric status.
    #[must_use]
    pub fn from_i32(value: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.as_i32() == value)
    }

    /// Classifies an I/O failure that ended a run.
    ///
    /// ```
    /// use rsync_core::ExitCode;
    /// use std::io::{Error, ErrorKind};
    ///
    /// assert_eq!(ExitCode::from_io_error(&Error::from(ErrorKind::TimedOut)), ExitCode::Timeout);
    /// ```
    #[must_use]
    pub fn from_io_error(error: &io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => Self::FileSelect,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected => Self::SocketIo,
            io::ErrorKind::TimedOut => Self::Timeout,
            io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData => Self::StreamIo,
            io::ErrorKind::Interrupted => Self::Signal,
            _ => Self::FileIo,
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.as_i32()
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        Self::from(code.as_i32().clamp(0, 255) as u8)
    }
}

/// Errors that know which exit status they end a run with.
pub trait HasExitCode {
    /// Status for this error.
    fn exit_code(&self) -> ExitCode;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_the_table() {
        let values: Vec<i32> = ExitCode::ALL.iter().map(|c| c.as_i32()).collect();
        assert_eq!(values, [0, 1, 2, 3, 4, 5, 10, 11, 12, 13, 14, 20, 23, 24, 25, 30]);
    }

    #[test]
    fn from_i32_round_trips() {
        for code in ExitCode::ALL {
            assert_eq!(ExitCode::from_i32(code.as_i32()), Some(code));
        }
        assert_eq!(ExitCode::from_i32(6), None);
        assert_eq!(ExitCode::from_i32(255), None);
    }

    #[test]
    fn io_errors_are_classified() {
        let kind = |k| ExitCode::from_io_error(&io::Error::from(k));
        assert_eq!(kind(io::ErrorKind::BrokenPipe), ExitCode::SocketIo);
        assert_eq!(kind(io::ErrorKind::UnexpectedEof), ExitCode::StreamIo);
        assert_eq!(kind(io::ErrorKind::NotFound), ExitCode::FileSelect);
        assert_eq!(kind(io::ErrorKind::Other), ExitCode::FileIo);
    }

    #[test]
    fn display_uses_description() {
        assert_eq!(ExitCode::DeleteLimit.to_string(), "the --max-delete limit stopped deletions");
        assert!(ExitCode::ALL.iter().all(|c| !c.description().is_empty()));
    }
}
