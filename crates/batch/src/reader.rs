//! crates/batch/src/reader.rs
//!
//! Opens a recorded batch for replay.

use std::fs::File;
use std::path::Path;

use logging::debug_log;

use crate::error::{BatchError, BatchResult};
use crate::header::BatchHeader;

/// Opens `path`, validates its header and returns the file positioned at
/// the start of the recorded stream.
///
/// The stream is exactly what a sender wrote to the receiver, so the
/// caller feeds it to the receiving side in place of a connection.
pub fn open_batch(path: &Path) -> BatchResult<(BatchHeader, File)> {
    let mut file = File::open(path).map_err(|err| BatchError::file(path, err))?;
    let header = BatchHeader::read(&mut file)?;
    debug_log!(
        Io,
        1,
        "replaying batch {} recorded at protocol {}",
        path.display(),
        header.protocol.as_u32()
    );
    Ok((header, file))
}
