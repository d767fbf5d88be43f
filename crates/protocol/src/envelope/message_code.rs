use std::fmt;

/// Message tags carried by multiplexed frames.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u8)]
pub enum MessageCode {
    #[doc(alias = "MSG_DATA")]
    /// Protocol payload.
    Data = 0,
    #[doc(alias = "MSG_ERROR_XFER")]
    /// Per-file transfer error.
    ErrorXfer = 1,
    #[doc(alias = "MSG_INFO")]
    /// Informational log line.
    Info = 2,
    #[doc(alias = "MSG_ERROR")]
    /// Error log line.
    Error = 3,
    #[doc(alias = "MSG_WARNING")]
    /// Warning log line.
    Warning = 4,
    #[doc(alias = "MSG_ERROR_SOCKET")]
    /// Socket error reported by the peer.
    ErrorSocket = 5,
    #[doc(alias = "MSG_LOG")]
    /// Line destined for the daemon log.
    Log = 6,
    #[doc(alias = "MSG_CLIENT")]
    /// Client-only message.
    Client = 7,
    #[doc(alias = "MSG_ERROR_UTF8")]
    /// Filename conversion error.
    ErrorUtf8 = 8,
    #[doc(alias = "MSG_REDO")]
    /// Reprocess the given file index.
    Redo = 9,
    #[doc(alias = "MSG_STATS")]
    /// Transfer statistics.
    Stats = 10,
    #[doc(alias = "MSG_IO_ERROR")]
    /// Source-side I/O error bits.
    IoError = 22,
    #[doc(alias = "MSG_IO_TIMEOUT")]
    /// Peer announces its timeout.
    IoTimeout = 33,
    #[doc(alias = "MSG_NOOP")]
    /// Keepalive.
    NoOp = 42,
    #[doc(alias = "MSG_ERROR_EXIT")]
    /// Peer is exiting with the carried code.
    ErrorExit = 86,
    #[doc(alias = "MSG_SUCCESS")]
    /// File index completed successfully.
    Success = 100,
    #[doc(alias = "MSG_DELETED")]
    /// Receiver deleted a file.
    Deleted = 101,
    #[doc(alias = "MSG_NO_SEND")]
    /// Sender could not open the file index.
    NoSend = 102,
}

impl MessageCode {
    /// Every code in wire order.
    pub const ALL: [Self; 18] = [
        Self::Data,
        Self::ErrorXfer,
        Self::Info,
        Self::Error,
        Self::Warning,
        Self::ErrorSocket,
        Self::Log,
        Self::Client,
        Self::ErrorUtf8,
        Self::Redo,
        Self::Stats,
        Self::IoError,
        Self::IoTimeout,
        Self::NoOp,
        Self::ErrorExit,
        Self::Success,
        Self::Deleted,
        Self::NoSend,
    ];

    /// Numeric value on the wire.
    #[must_use]
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Maps a wire value back to a code.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Data),
            1 => Some(Self::ErrorXfer),
            2 => Some(Self::Info),
            3 => Some(Self::Error),
            4 => Some(Self::Warning),
            5 => Some(Self::ErrorSocket),
            6 => Some(Self::Log),
            7 => Some(Self::Client),
            8 => Some(Self::ErrorUtf8),
            9 => Some(Self::Redo),
            10 => Some(Self::Stats),
            22 => Some(Self::IoError),
            33 => Some(Self::IoTimeout),
            42 => Some(Self::NoOp),
            86 => Some(Self::ErrorExit),
            100 => Some(Self::Success),
            101 => Some(Self::Deleted),
            102 => Some(Self::NoSend),
            _ => None,
        }
    }

    /// Wire mnemonic, e.g. `MSG_DATA`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Data => "MSG_DATA",
            Self::ErrorXfer => "MSG_ERROR_XFER",
            Self::Info => "MSG_INFO",
            Self::Error => "MSG_ERROR",
            Self::Warning => "MSG_WARNING",
            Self::ErrorSocket => "MSG_ERROR_SOCKET",
            Self::Log => "MSG_LOG",
            Self::Client => "MSG_CLIENT",
            Self::ErrorUtf8 => "MSG_ERROR_UTF8",
            Self::Redo => "MSG_REDO",
            Self::Stats => "MSG_STATS",
            Self::IoError => "MSG_IO_ERROR",
            Self::IoTimeout => "MSG_IO_TIMEOUT",
            Self::NoOp => "MSG_NOOP",
            Self::ErrorExit => "MSG_ERROR_EXIT",
            Self::Success => "MSG_SUCCESS",
            Self::Deleted => "MSG_DELETED",
            Self::NoSend => "MSG_NO_SEND",
        }
    }

    /// Whether the frame reports an error that counts against the run.
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(
            self,
            Self::ErrorXfer | Self::Error | Self::ErrorSocket | Self::ErrorUtf8
        )
    }
}

impl fmt::Display for MessageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
