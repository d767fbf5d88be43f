//! crates/transfer/src/error.rs
//!
//! Failures that end a transfer and the exit status each one maps to.
//!
//! Per-file problems never surface here directly: they are logged, counted
//! and folded into [`TransferError::Partial`] once the session completes.

use std::io;
use std::path::{Path, PathBuf};

use batch::BatchError;
use flist::IO_ERROR_VANISHED;
use matching::MatchError;
use metadata::MetadataError;
use protocol::ProtocolError;
use rsync_core::{ExitCode, HasExitCode, ShutdownReason};
use signature::SignatureError;
use thiserror::Error;

/// Result alias for the transfer crate.
pub type TransferResult<T> = Result<T, TransferError>;

/// Why a transfer did not finish cleanly.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The connection carried something we could not accept, or broke.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// A local filesystem call failed where the session cannot continue.
    #[error("{context} {}: {source}", path.display())]
    Io {
        /// Operation attempted.
        context: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
    /// A file still failed its whole-file digest after the redo pass.
    #[error("{} failed verification", path.display())]
    Verification {
        /// Destination path.
        path: PathBuf,
    },
    /// Spawning or talking to the peer process failed.
    #[error("{context}: {source}")]
    Ipc {
        /// What was being set up.
        context: String,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
    /// The session completed but some files were not transferred.
    #[error("some files were not transferred ({errors} errors, io_error {io_error:#x})")]
    Partial {
        /// Per-file errors, local and reported by the peer.
        errors: u32,
        /// The sender's io-error word.
        io_error: i32,
    },
    /// The peer or a batch speaks a protocol we cannot.
    #[error("protocol version mismatch: remote is {remote}, minimum supported is {minimum}")]
    Incompatible {
        /// Version offered.
        remote: u32,
        /// Oldest we accept.
        minimum: u32,
    },
    /// A signal ended the run.
    #[error("{}", .0.description())]
    Interrupted(ShutdownReason),
    /// `--max-delete` stopped the delete pass.
    #[error("deletions stopped at the --max-delete limit, {skipped} not deleted")]
    DeleteLimit {
        /// Entries left in place.
        skipped: u64,
    },
    /// Options that cannot be honored together.
    #[error("{0}")]
    Usage(String),
}

impl TransferError {
    /// Wraps a local I/O failure on `path`.
    pub fn io(context: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            context,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Wraps a process or socket setup failure.
    pub fn ipc(context: impl Into<String>, source: io::Error) -> Self {
        Self::Ipc {
            context: context.into(),
            source,
        }
    }

    /// Exit status for this failure.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Protocol(err) => protocol_exit_code(err),
            Self::Io { source, .. } => ExitCode::from_io_error(source),
            Self::Verification { .. } => ExitCode::PartialTransfer,
            Self::Ipc { .. } => ExitCode::Ipc,
            Self::Partial { errors, io_error } => {
                if *errors == 0 && *io_error == IO_ERROR_VANISHED {
                    ExitCode::Vanished
                } else {
                    ExitCode::PartialTransfer
                }
            }
            Self::Incompatible { .. } => ExitCode::Protocol,
            Self::Interrupted(reason) => reason.exit_code(),
            Self::DeleteLimit { .. } => ExitCode::DeleteLimit,
            Self::Usage(_) => ExitCode::Syntax,
        }
    }
}

fn protocol_exit_code(err: &ProtocolError) -> ExitCode {
    match err {
        ProtocolError::Incompatible { .. } => ExitCode::Protocol,
        ProtocolError::Envelope(_) | ProtocolError::Malformed { .. } => ExitCode::StreamIo,
        ProtocolError::RemoteExit(code) => ExitCode::from_i32(*code).unwrap_or(ExitCode::StreamIo),
        ProtocolError::Daemon(_) | ProtocolError::DaemonExit => ExitCode::StartClient,
        ProtocolError::Io(inner) => ExitCode::from_io_error(inner),
    }
}

impl HasExitCode for TransferError {
    fn exit_code(&self) -> ExitCode {
        Self::exit_code(self)
    }
}

impl From<io::Error> for TransferError {
    fn from(err: io::Error) -> Self {
        match ProtocolError::from_io(err) {
            ProtocolError::Incompatible { remote, minimum } => {
                Self::Incompatible { remote, minimum }
            }
            other => Self::Protocol(other),
        }
    }
}

impl From<MetadataError> for TransferError {
    fn from(err: MetadataError) -> Self {
        let (context, path, source) = err.into_parts();
        Self::Io {
            context,
            path,
            source,
        }
    }
}

impl From<MatchError> for TransferError {
    fn from(err: MatchError) -> Self {
        io::Error::from(err).into()
    }
}

impl From<SignatureError> for TransferError {
    fn from(err: SignatureError) -> Self {
        io::Error::from(err).into()
    }
}

impl From<BatchError> for TransferError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::Incompatible { version, min, .. } => Self::Incompatible {
                remote: u32::try_from(version).unwrap_or(0),
                minimum: min,
            },
            BatchError::File { path, source } => Self::Io {
                context: "batch file",
                path,
                source,
            },
            BatchError::Io(source) => Self::Protocol(ProtocolError::Io(source)),
            BatchError::InvalidFormat(detail) => {
                Self::Protocol(ProtocolError::malformed("batch header", detail))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use flist::IO_ERROR_GENERAL;

    use super::*;

    #[test]
    fn partial_distinguishes_vanished_files() {
        let vanished = TransferError::Partial {
            errors: 0,
            io_error: IO_ERROR_VANISHED,
        };
        assert_eq!(vanished.exit_code(), ExitCode::Vanished);
        let failed = TransferError::Partial {
            errors: 2,
            io_error: IO_ERROR_VANISHED,
        };
        assert_eq!(failed.exit_code(), ExitCode::PartialTransfer);
        let general = TransferError::Partial {
            errors: 0,
            io_error: IO_ERROR_GENERAL,
        };
        assert_eq!(general.exit_code().as_i32(), 23);
    }

    #[test]
    fn remote_exit_codes_pass_through() {
        let err = TransferError::from(io::Error::from(ProtocolError::RemoteExit(25)));
        assert_eq!(err.exit_code(), ExitCode::DeleteLimit);
        let unknown = TransferError::Protocol(ProtocolError::RemoteExit(77));
        assert_eq!(unknown.exit_code(), ExitCode::StreamIo);
    }

    #[test]
    fn incompatible_peer_exits_with_protocol_code() {
        let err = TransferError::from(io::Error::from(ProtocolError::Incompatible {
            remote: 20,
            minimum: 27,
        }));
        assert!(matches!(err, TransferError::Incompatible { remote: 20, .. }));
        assert_eq!(err.exit_code().as_i32(), 2);
    }

    #[test]
    fn timeouts_and_hangups_classify() {
        let timeout = TransferError::from(io::Error::from(io::ErrorKind::TimedOut));
        assert_eq!(timeout.exit_code(), ExitCode::Timeout);
        let eof = TransferError::from(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert_eq!(eof.exit_code(), ExitCode::StreamIo);
        assert_eq!(
            TransferError::DeleteLimit { skipped: 1 }.exit_code().as_i32(),
            25
        );
        assert_eq!(
            TransferError::Interrupted(ShutdownReason::Interrupted).exit_code(),
            ExitCode::Signal
        );
    }
}
