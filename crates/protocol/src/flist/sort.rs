//! crates/protocol/src/flist/sort.rs
//!
//! Canonical ordering shared by both ends so wire indices agree.

use logging::debug_log;

use super::entry::{FileEntry, FileKind};

/// Sorts entries component-wise by name and drops later duplicates.
///
/// Component-wise ordering keeps every directory's contents directly after
/// the directory itself. When a directory and a non-directory share a name
/// the directory wins.
pub fn sort_and_dedup(entries: &mut Vec<FileEntry>) {
    entries.sort_by(|a, b| {
        a.name.cmp(&b.name).then_with(|| {
            let a_dir = a.kind() == FileKind::Directory;
            let b_dir = b.kind() == FileKind::Directory;
            b_dir.cmp(&a_dir)
        })
    });
    entries.dedup_by(|later, kept| {
        let duplicate = later.name == kept.name;
        if duplicate {
            debug_log!(Flist, 1, "removing duplicate name {:?}", later.name);
            kept.top_dir |= later.top_dir;
        }
        duplicate
    });
}

/// Maps a sender index to a position in `entries`.
///
/// Indices the receiver dropped map to `None`.
#[must_use]
pub fn send_index_map(entries: &[FileEntry]) -> Vec<Option<usize>> {
    let len = entries
        .iter()
        .map(|e| e.send_index + 1)
        .max()
        .unwrap_or(0);
    let mut map = vec![None; len];
    for (local, entry) in entries.iter().enumerate() {
        map[entry.send_index] = Some(local);
    }
    map
}
