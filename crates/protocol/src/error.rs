//! crates/protocol/src/error.rs
//!
//! Connection-level protocol failures.

use std::io;

use thiserror::Error;

use crate::envelope::EnvelopeError;

/// Errors that end a protocol connection.
///
/// Wire primitives report through [`io::Error`]; a `ProtocolError` travels
/// inside it as the custom payload so callers can recover the precise cause
/// with [`ProtocolError::from_io`].
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The peer speaks a protocol older than we support.
    #[error("protocol version mismatch: remote is {remote}, minimum supported is {minimum}")]
    Incompatible {
        /// Version advertised by the peer.
        remote: u32,
        /// Oldest version we accept.
        minimum: u32,
    },
    /// A multiplex header could not be decoded.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    /// The peer sent a structurally invalid value.
    #[error("invalid {what} received: {detail}")]
    Malformed {
        /// Which field was being read.
        what: &'static str,
        /// Human readable detail.
        detail: String,
    },
    /// The peer asked us to exit with a given code via `MSG_ERROR_EXIT`.
    #[error("remote requested exit with code {0}")]
    RemoteExit(i32),
    /// The daemon rejected the request with an `@ERROR` line.
    #[error("daemon error: {0}")]
    Daemon(String),
    /// The daemon closed the session with `@RSYNCD: EXIT`.
    #[error("daemon closed the connection")]
    DaemonExit,
    /// The descriptor failed or hung up.
    #[error(transparent)]
    Io(io::Error),
}

impl ProtocolError {
    /// Shorthand for [`ProtocolError::Malformed`].
    pub fn malformed(what: &'static str, detail: impl Into<String>) -> Self {
        Self::Malformed {
            what,
            detail: detail.into(),
        }
    }

    /// Recovers a protocol error carried inside an [`io::Error`], otherwise
    /// wraps the I/O error.
    #[must_use]
    pub fn from_io(err: io::Error) -> Self {
        if !err.get_ref().is_some_and(|inner| inner.is::<Self>()) {
            return Self::Io(err);
        }
        let kind = err.kind();
        match err.into_inner() {
            Some(inner) => match inner.downcast::<Self>() {
                Ok(proto) => *proto,
                Err(other) => Self::Io(io::Error::new(kind, other)),
            },
            None => Self::Io(io::Error::from(kind)),
        }
    }
}

impl From<io::Error> for ProtocolError {
    fn from(err: io::Error) -> Self {
        Self::from_io(err)
    }
}

impl From<ProtocolError> for io::Error {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(inner) => inner,
            ProtocolError::Incompatible { .. }
            | ProtocolError::Envelope(_)
            | ProtocolError::Malformed { .. } => Self::new(io::ErrorKind::InvalidData, err),
            other => Self::other(other),
        }
    }
}
