//! crates/protocol/src/version.rs
//!
//! Protocol version constants and negotiation.

use std::fmt;

use crate::error::ProtocolError;

/// Oldest protocol accepted from a peer.
pub const PROTOCOL_MIN: u32 = 27;

/// Protocol advertised by this implementation.
pub const PROTOCOL_VERSION: u32 = 29;

/// A negotiated protocol version.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct ProtocolVersion(u32);

impl ProtocolVersion {
    /// The version we advertise.
    pub const CURRENT: Self = Self(PROTOCOL_VERSION);

    /// Oldest supported version.
    pub const OLDEST: Self = Self(PROTOCOL_MIN);

    /// Wraps a version number known to be in range.
    ///
    /// Returns `None` for versions older than [`PROTOCOL_MIN`].
    #[must_use]
    pub const fn new(version: u32) -> Option<Self> {
        if version < PROTOCOL_MIN {
            None
        } else {
            Some(Self(version))
        }
    }

    /// Picks `min(local, remote)`, refusing peers below [`PROTOCOL_MIN`].
    pub fn negotiate(local: u32, remote: i32) -> Result<Self, ProtocolError> {
        let remote_u = u32::try_from(remote).unwrap_or(0);
        if remote_u < PROTOCOL_MIN {
            return Err(ProtocolError::Incompatible {
                remote: remote_u,
                minimum: PROTOCOL_MIN,
            });
        }
        Ok(Self(local.min(remote_u)))
    }

    /// Numeric value.
    #[must_use]
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Number of file-list passes: normal plus redo from 29 on.
    #[must_use]
    pub const fn max_phase(self) -> u32 {
        if self.0 >= 29 { 2 } else { 1 }
    }

    /// Whether transfer requests carry itemize flags.
    #[must_use]
    pub const fn has_item_flags(self) -> bool {
        self.0 >= 29
    }

    /// Whether file-list flags may spill into a second byte.
    #[must_use]
    pub const fn has_extended_flist_flags(self) -> bool {
        self.0 >= 28
    }

    /// Whether the compressed stream's dictionary inserts advance through
    /// long runs instead of repeating the first chunk.
    #[must_use]
    pub const fn advances_insert_offset(self) -> bool {
        self.0 >= 31
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiates_minimum_of_both() {
        assert_eq!(
            ProtocolVersion::negotiate(29, 31).unwrap().as_u32(),
            29
        );
        assert_eq!(
            ProtocolVersion::negotiate(29, 27).unwrap().as_u32(),
            27
        );
    }

    #[test]
    fn rejects_old_and_garbage_peers() {
        assert!(matches!(
            ProtocolVersion::negotiate(29, 26),
            Err(ProtocolError::Incompatible { remote: 26, minimum: 27 })
        ));
        assert!(matches!(
            ProtocolVersion::negotiate(29, -5),
            Err(ProtocolError::Incompatible { remote: 0, .. })
        ));
    }

    #[test]
    fn phase_count_depends_on_version() {
        assert_eq!(ProtocolVersion::new(27).unwrap().max_phase(), 1);
        assert_eq!(ProtocolVersion::new(28).unwrap().max_phase(), 1);
        assert_eq!(ProtocolVersion::CURRENT.max_phase(), 2);
        assert!(ProtocolVersion::new(26).is_none());
    }
}
