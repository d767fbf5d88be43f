//! crates/batch/src/error.rs
//!
//! Error types for batch operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for batch operations.
pub type BatchResult<T> = Result<T, BatchError>;

/// Errors that can occur while writing or replaying a batch.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The batch file could not be created, opened or read.
    #[error("batch file '{}': {source}", path.display())]
    File {
        /// Batch file path.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
    /// I/O error while streaming.
    #[error("I/O error: {0}")]
    Io(
        #[from]
        #[source]
        io::Error,
    ),
    /// The header is damaged or names options this build cannot replay.
    #[error("invalid batch format: {0}")]
    InvalidFormat(String),
    /// The batch was recorded with a protocol outside the supported range.
    #[error("batch protocol {version} is not supported (need {min}..={max})")]
    Incompatible {
        /// Version in the header.
        version: i32,
        /// Oldest supported.
        min: u32,
        /// Newest supported.
        max: u32,
    },
}

impl BatchError {
    pub(crate) fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_error_names_path() {
        let err = BatchError::file("/tmp/b", io::Error::from(io::ErrorKind::NotFound));
        assert!(err.to_string().starts_with("batch file '/tmp/b'"));
    }

    #[test]
    fn incompatible_lists_range() {
        let err = BatchError::Incompatible {
            version: 31,
            min: 27,
            max: 29,
        };
        assert_eq!(err.to_string(), "batch protocol 31 is not supported (need 27..=29)");
    }

    #[test]
    fn io_error_converts() {
        let err: BatchError = io::Error::from(io::ErrorKind::UnexpectedEof).into();
        assert!(matches!(err, BatchError::Io(_)));
    }
}
