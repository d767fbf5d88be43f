//! crates/metadata/src/error.rs

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// A metadata or placement operation failed on one path.
#[derive(Debug, Error)]
#[error("failed to {context} '{}': {source}", path.display())]
pub struct MetadataError {
    context: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
}

impl MetadataError {
    pub(crate) fn new(context: &'static str, path: &Path, source: io::Error) -> Self {
        Self {
            context,
            path: path.to_path_buf(),
            source,
        }
    }

    /// The operation being performed.
    #[must_use]
    pub const fn context(&self) -> &'static str {
        self.context
    }

    /// The path involved.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The underlying error.
    #[must_use]
    pub const fn source_error(&self) -> &io::Error {
        &self.source
    }

    /// Splits the error into its parts.
    #[must_use]
    pub fn into_parts(self) -> (&'static str, PathBuf, io::Error) {
        (self.context, self.path, self.source)
    }
}

impl From<MetadataError> for io::Error {
    fn from(err: MetadataError) -> Self {
        Self::new(err.source.kind(), err)
    }
}
