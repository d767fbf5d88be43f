//! Framed, optionally multiplexed, wire streams.
//!
//! [`WireReader`] and [`WireWriter`] wrap one direction of a connection.
//! With multiplexing off they pass bytes through unchanged; with it on,
//! payload travels in `MSG_DATA` frames and other frames carry log lines
//! and control messages that are handled out of band.

mod oob;
mod reader;
mod writer;

pub use oob::{ControlMessage, OutOfBand};
pub use reader::WireReader;
pub use writer::{WireWriter, WriteMode};

/// Largest data payload buffered before a frame is emitted.
pub const MAX_CHUNK: usize = 32 * 1024;
