//! crates/protocol/src/flist/state.rs
//!
//! Fields remembered from the previous entry so "same as previous" flags
//! can be resolved on both sides.

use super::entry::FileEntry;

/// Longest path accepted from the wire.
pub(crate) const MAX_NAME_LEN: usize = 4096;

#[derive(Debug, Default)]
pub(crate) struct Previous {
    pub(crate) seen: bool,
    pub(crate) name: Vec<u8>,
    pub(crate) mode: u32,
    pub(crate) uid: u32,
    pub(crate) gid: u32,
    pub(crate) mtime: i64,
    pub(crate) rdev: u64,
    pub(crate) rdev_major: u32,
    pub(crate) dev: u64,
}

impl Previous {
    pub(crate) fn remember(&mut self, entry: &FileEntry) {
        self.seen = true;
        self.name.clear();
        self.name.extend_from_slice(entry.name_bytes());
        self.mode = entry.mode;
        self.uid = entry.uid;
        self.gid = entry.gid;
        self.mtime = entry.mtime;
        if entry.kind().is_device() || entry.kind().is_special() {
            self.rdev = entry.rdev;
            self.rdev_major = rdev_major(entry.rdev);
        }
        if let Some(id) = entry.link_id {
            self.dev = id.dev;
        }
    }

    /// Length of the shared name prefix, capped at what one byte can carry.
    pub(crate) fn shared_prefix(&self, name: &[u8]) -> usize {
        self.name
            .iter()
            .zip(name)
            .take_while(|(a, b)| a == b)
            .count()
            .min(usize::from(u8::MAX))
    }
}

pub(crate) fn rdev_major(rdev: u64) -> u32 {
    rustix::fs::major(rdev as _)
}

pub(crate) fn rdev_minor(rdev: u64) -> u32 {
    rustix::fs::minor(rdev as _)
}

#[allow(clippy::unnecessary_cast, clippy::useless_conversion)]
pub(crate) fn make_rdev(major: u32, minor: u32) -> u64 {
    rustix::fs::makedev(major, minor) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_capped() {
        let mut prev = Previous::default();
        prev.name = vec![b'a'; 400];
        assert_eq!(prev.shared_prefix(&[b'a'; 300]), 255);
        assert_eq!(prev.shared_prefix(b"ab"), 1);
        assert_eq!(prev.shared_prefix(b""), 0);
    }

    #[test]
    fn device_numbers_split_and_join() {
        let rdev = make_rdev(8, 17);
        assert_eq!(rdev_major(rdev), 8);
        assert_eq!(rdev_minor(rdev), 17);
    }
}
