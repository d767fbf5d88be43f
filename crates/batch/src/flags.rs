//! crates/batch/src/flags.rs
//!
//! The option bitmap at the head of a batch file.
//!
//! Each bit records one option the replaying side must match for the
//! recorded stream to decode. Bits are added in protocol order, so a bit
//! only exists for batches written at or above its protocol.

use protocol::ProtocolVersion;

/// Bit position and the oldest protocol that carries it, in table order:
/// recurse, owner, group, links, devices, hard links, checksum, dirs.
const TABLE: [u32; 8] = [0, 0, 0, 0, 0, 0, 0, 29];

/// Options recorded in a batch header.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BatchFlags {
    /// `--recursive`.
    pub recurse: bool,
    /// `--owner`.
    pub preserve_uid: bool,
    /// `--group`.
    pub preserve_gid: bool,
    /// `--links`.
    pub preserve_links: bool,
    /// `--devices`.
    pub preserve_devices: bool,
    /// `--hard-links`.
    pub preserve_hard_links: bool,
    /// `--checksum`.
    pub always_checksum: bool,
    /// `--dirs`.
    pub xfer_dirs: bool,
}

impl BatchFlags {
    const fn slots(self) -> [bool; 8] {
        [
            self.recurse,
            self.preserve_uid,
            self.preserve_gid,
            self.preserve_links,
            self.preserve_devices,
            self.preserve_hard_links,
            self.always_checksum,
            self.xfer_dirs,
        ]
    }

    /// Packs the flags for `protocol`; bits newer than the protocol are
    /// left out.
    #[must_use]
    pub fn to_bitmap(self, protocol: ProtocolVersion) -> i32 {
        self.slots()
            .iter()
            .zip(TABLE)
            .enumerate()
            .filter(|&(_, (&on, min))| on && protocol.as_u32() >= min)
            .fold(0, |bits, (bit, _)| bits | (1 << bit))
    }

    /// Unpacks a bitmap written at `protocol`.
    ///
    /// Returns the unknown bits as an error so a replay never silently
    /// ignores an option it cannot honour.
    pub fn from_bitmap(bits: i32, protocol: ProtocolVersion) -> Result<Self, i32> {
        let known = TABLE
            .iter()
            .enumerate()
            .filter(|&(_, &min)| protocol.as_u32() >= min)
            .fold(0i32, |mask, (bit, _)| mask | (1 << bit));
        if bits & !known != 0 {
            return Err(bits & !known);
        }
        let on = |bit: usize| bits & (1 << bit) != 0;
        Ok(Self {
            recurse: on(0),
            preserve_uid: on(1),
            preserve_gid: on(2),
            preserve_links: on(3),
            preserve_devices: on(4),
            preserve_hard_links: on(5),
            always_checksum: on(6),
            xfer_dirs: on(7),
        })
    }
}
