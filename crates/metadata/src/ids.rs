//! crates/metadata/src/ids.rs
//!
//! Name lookups backing the file list's uid and gid tables.

use protocol::flist::IdResolver;

/// Resolves ids through the system user and group databases.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemIds;

impl IdResolver for SystemIds {
    fn user_name(&self, uid: u32) -> Option<String> {
        uzers::get_user_by_uid(uid).map(|user| user.name().to_string_lossy().into_owned())
    }

    fn group_name(&self, gid: u32) -> Option<String> {
        uzers::get_group_by_gid(gid).map(|group| group.name().to_string_lossy().into_owned())
    }

    fn uid_by_name(&self, name: &str) -> Option<u32> {
        uzers::get_user_by_name(name).map(|user| user.uid())
    }

    fn gid_by_name(&self, name: &str) -> Option<u32> {
        uzers::get_group_by_name(name).map(|group| group.gid())
    }
}
