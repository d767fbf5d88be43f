use super::error::EnvelopeError;
use super::message_code::MessageCode;
use super::{HEADER_LEN, MAX_PAYLOAD_LENGTH, MPLEX_BASE, PAYLOAD_MASK};

/// A decoded multiplex frame header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MessageHeader {
    code: MessageCode,
    payload_len: u32,
}

impl MessageHeader {
    /// Creates a header, rejecting payloads over 24 bits.
    pub const fn new(code: MessageCode, payload_len: u32) -> Result<Self, EnvelopeError> {
        if payload_len > MAX_PAYLOAD_LENGTH {
            return Err(EnvelopeError::OversizedPayload(payload_len));
        }
        Ok(Self { code, payload_len })
    }

    /// Parses a header from the start of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let Some(raw) = bytes.first_chunk::<HEADER_LEN>() else {
            return Err(EnvelopeError::TruncatedHeader {
                actual: bytes.len(),
            });
        };
        Self::from_raw(u32::from_le_bytes(*raw))
    }

    /// Builds a header from its raw 32-bit value.
    pub const fn from_raw(raw: u32) -> Result<Self, EnvelopeError> {
        let tag = (raw >> 24) as u8;
        if tag < MPLEX_BASE {
            return Err(EnvelopeError::InvalidTag(tag));
        }
        let value = tag - MPLEX_BASE;
        match MessageCode::from_u8(value) {
            Some(code) => Self::new(code, raw & PAYLOAD_MASK),
            None => Err(EnvelopeError::UnknownMessageCode(value)),
        }
    }

    /// Wire encoding.
    #[must_use]
    pub const fn encode(self) -> [u8; HEADER_LEN] {
        let tag = MPLEX_BASE as u32 + self.code as u32;
        ((tag << 24) | (self.payload_len & PAYLOAD_MASK)).to_le_bytes()
    }

    /// Message code.
    #[must_use]
    #[inline]
    pub const fn code(self) -> MessageCode {
        self.code
    }

    /// Payload length in bytes.
    #[must_use]
    #[inline]
    pub const fn payload_len(self) -> usize {
        self.payload_len as usize
    }
}
