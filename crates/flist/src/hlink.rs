//! crates/flist/src/hlink.rs
//!
//! Hard-link groups over a sorted file list.
//!
//! Regular files sharing a device/inode pair form a group. The first
//! member in list order is the leader and is transferred normally; the
//! others are recreated as links to it once the leader is in place.
//! Files on different devices never share a group.

use protocol::flist::{FileEntry, FileKind, HardLinkId};
use rustc_hash::FxHashMap;

/// Leader lookup for every file that belongs to a hard-link group.
#[derive(Clone, Debug, Default)]
pub struct HardLinkGroups {
    leaders: FxHashMap<usize, usize>,
}

impl HardLinkGroups {
    /// Groups `entries` by their hard-link identity.
    #[must_use]
    pub fn from_entries(entries: &[FileEntry]) -> Self {
        let mut first: FxHashMap<HardLinkId, usize> = FxHashMap::default();
        let mut leaders = FxHashMap::default();
        for (index, entry) in entries.iter().enumerate() {
            if entry.kind() != FileKind::Regular {
                continue;
            }
            let Some(id) = entry.link_id else { continue };
            match first.get(&id) {
                Some(&leader) => {
                    leaders.insert(index, leader);
                }
                None => {
                    first.insert(id, index);
                }
            }
        }
        Self { leaders }
    }

    /// The leader `index` links to, or `None` when `index` is transferred
    /// on its own.
    #[must_use]
    pub fn leader_of(&self, index: usize) -> Option<usize> {
        self.leaders.get(&index).copied()
    }

    /// Whether `index` is created as a link rather than transferred.
    #[must_use]
    pub fn is_follower(&self, index: usize) -> bool {
        self.leaders.contains_key(&index)
    }

    /// Every `(follower, leader)` pair, followers in list order.
    #[must_use]
    pub fn followers(&self) -> Vec<(usize, usize)> {
        let mut pairs: Vec<_> = self.leaders.iter().map(|(&f, &l)| (f, l)).collect();
        pairs.sort_unstable();
        pairs
    }

    /// Whether no file needs linking.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linked(name: &str, dev: u64, ino: u64) -> FileEntry {
        let mut entry = FileEntry::new(name, 0o100_644);
        entry.link_id = Some(HardLinkId { dev, ino });
        entry
    }

    #[test]
    fn first_member_leads_its_group() {
        let entries = vec![
            linked("a", 1, 10),
            FileEntry::new("b", 0o100_644),
            linked("c", 1, 10),
            linked("d", 1, 10),
        ];
        let groups = HardLinkGroups::from_entries(&entries);
        assert_eq!(groups.leader_of(0), None);
        assert_eq!(groups.leader_of(1), None);
        assert_eq!(groups.leader_of(2), Some(0));
        assert_eq!(groups.followers(), vec![(2, 0), (3, 0)]);
    }

    #[test]
    fn different_devices_are_not_linked() {
        let entries = vec![linked("a", 1, 10), linked("b", 2, 10)];
        assert!(HardLinkGroups::from_entries(&entries).is_empty());
    }

    #[test]
    fn directories_are_ignored() {
        let mut dir = FileEntry::new("d", 0o040_755);
        dir.link_id = Some(HardLinkId { dev: 1, ino: 10 });
        let entries = vec![dir, linked("f", 1, 10)];
        assert!(!HardLinkGroups::from_entries(&entries).is_follower(1));
    }
}
