use thiserror::Error;

use super::HEADER_LEN;

/// Failure to decode or build a multiplex header.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum EnvelopeError {
    /// Fewer than [`HEADER_LEN`] bytes were supplied.
    #[error("multiplexed header truncated: {actual} of {HEADER_LEN} bytes")]
    TruncatedHeader {
        /// Bytes that were available.
        actual: usize,
    },
    /// The tag byte is below `MPLEX_BASE`.
    #[error("unexpected tag {0} in multiplexed stream")]
    InvalidTag(u8),
    /// The tag maps to no known message code.
    #[error("unknown multiplexed message code {0}")]
    UnknownMessageCode(u8),
    /// The payload does not fit in 24 bits.
    #[error("multiplexed payload of {0} bytes exceeds the 24-bit limit")]
    OversizedPayload(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        assert_eq!(
            EnvelopeError::TruncatedHeader { actual: 2 }.to_string(),
            "multiplexed header truncated: 2 of 4 bytes"
        );
        assert!(EnvelopeError::UnknownMessageCode(50).to_string().contains("50"));
    }
}
