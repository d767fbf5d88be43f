//! crates/transfer/src/receiver/links.rs
//!
//! Symbolic links and hard-link groups on the receiving side.

use std::fs;
use std::io;
use std::os::unix::fs::{MetadataExt, symlink};
use std::path::{Component, Path};

use logging::{debug_log, error_log, info_log};
use metadata::{MetadataTarget, set_metadata};
use protocol::flist::{EntryFlags, FileEntry};

use super::Context;
use crate::error::{TransferError, TransferResult};

/// Whether `target`, stored in the link `name`, could point outside the
/// transfer.
///
/// Absolute targets are unsafe. A relative target is walked from the
/// link's directory and is unsafe once it climbs above the root.
#[must_use]
pub(crate) fn is_unsafe_symlink(target: &Path, name: &Path) -> bool {
    if target.as_os_str().is_empty() || target.is_absolute() {
        return true;
    }
    let mut depth: i64 = name.parent().map_or(0, |dir| {
        dir.components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .count() as i64
    });
    for component in target.components() {
        match component {
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return true;
                }
            }
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return true,
        }
    }
    false
}

/// Creates or refreshes the symlink `entry` describes.
pub(crate) fn make_symlink(cx: &Context<'_>, entry: &FileEntry) -> TransferResult<()> {
    let name = entry.name.display();
    if !cx.options.preserve_links {
        info_log!(Nonreg, 1, "skipping non-regular file \"{name}\"");
        return Ok(());
    }
    let Some(target) = entry.link_target.as_deref() else {
        error_log!("symlink {name} arrived without a target");
        return Ok(());
    };
    if cx.options.safe_links && is_unsafe_symlink(target, &entry.name) {
        info_log!(Symsafe, 1, "ignoring unsafe symlink \"{name}\" -> \"{}\"", target.display());
        return Ok(());
    }
    let path = &entry.wpath;
    if let Ok(meta) = fs::symlink_metadata(path) {
        if meta.file_type().is_symlink()
            && fs::read_link(path).is_ok_and(|current| current == target)
        {
            debug_log!(Recv, 2, "{name} is uptodate");
            return Ok(());
        }
        if meta.is_dir() {
            error_log!("cannot replace directory {} with a symlink", path.display());
            return Err(TransferError::io(
                "symlink",
                path,
                io::Error::from(io::ErrorKind::IsADirectory),
            ));
        }
    }
    info_log!(Name, 1, "{name} -> {}", target.display());
    if !cx.options.writes_destination() {
        return Ok(());
    }

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().unwrap_or_default().to_string_lossy();
    let staging = parent.join(format!(".{file_name}.{}.lnk", std::process::id()));
    let _ = fs::remove_file(&staging);
    symlink(target, &staging).map_err(|err| TransferError::io("symlink", &staging, err))?;
    if let Err(err) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(TransferError::io("rename", path, err));
    }
    set_metadata(entry, MetadataTarget::Path(path), true, &cx.metadata)?;
    Ok(())
}

/// Links every hard-link follower to its group leader once the leaders
/// are in place.
pub(crate) fn link_followers(cx: &mut Context<'_>, entries: &[FileEntry]) {
    for (follower, leader) in cx.links.followers() {
        let (Some(follower), Some(leader)) = (entries.get(follower), entries.get(leader)) else {
            continue;
        };
        if leader.flags.contains(EntryFlags::FAILED) {
            debug_log!(Hlink, 1, "not linking {}: leader failed", follower.name.display());
            continue;
        }
        info_log!(Name, 1, "{} => {}", follower.name.display(), leader.name.display());
        if !cx.options.writes_destination() {
            continue;
        }
        if let Err(err) = hard_link(&leader.wpath, &follower.wpath) {
            error_log!("{err}");
            cx.errors += 1;
        }
    }
}

fn hard_link(leader: &Path, follower: &Path) -> TransferResult<()> {
    let source = fs::metadata(leader).map_err(|err| TransferError::io("stat", leader, err))?;
    if let Ok(existing) = fs::symlink_metadata(follower) {
        if existing.dev() == source.dev() && existing.ino() == source.ino() {
            return Ok(());
        }
        if existing.is_dir() {
            return Err(TransferError::io(
                "link",
                follower,
                io::Error::from(io::ErrorKind::IsADirectory),
            ));
        }
        fs::remove_file(follower).map_err(|err| TransferError::io("unlink", follower, err))?;
    }
    fs::hard_link(leader, follower).map_err(|err| TransferError::io("link", follower, err))
}
