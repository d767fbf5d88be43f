//! Multiplexed frame envelopes.
//!
//! Every frame starts with a little-endian `u32` whose top byte is
//! `MPLEX_BASE + code` and whose low 24 bits are the payload length.

mod error;
mod header;
mod message_code;

pub use error::EnvelopeError;
pub use header::MessageHeader;
pub use message_code::MessageCode;

/// Size of an encoded frame header.
pub const HEADER_LEN: usize = 4;

/// Offset added to a [`MessageCode`] to form the tag byte.
pub const MPLEX_BASE: u8 = 7;

/// Largest payload one frame can carry.
pub const MAX_PAYLOAD_LENGTH: u32 = 0x00ff_ffff;

pub(crate) const PAYLOAD_MASK: u32 = MAX_PAYLOAD_LENGTH;
