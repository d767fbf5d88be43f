//! crates/transfer/src/receiver/basis.rs
//!
//! Deciding whether a regular file needs data, and what to build it from.
//!
//! The destination itself is the usual basis. A partial file left by an
//! earlier run takes precedence; when the destination is missing the
//! alternate basis directories are searched in command-line order, and
//! last a fuzzy search of the destination directory. On protocol 29 the
//! choice travels in the request's basis byte so the echo tells the
//! downloader which file to open.

use std::ffi::OsStr;
use std::fs::{self, File, Metadata};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Component, Path, PathBuf};

use checksums::{MD4_DIGEST_LEN, file_digest};
use fast_io::{MappedFile, copy_file_contents};
use logging::info_log;
use metadata::{MetadataTarget, TempFile, set_metadata};
use protocol::flist::FileEntry;
use protocol::{FileRequest, ProtocolError};

use super::Context;
use crate::error::{TransferError, TransferResult};
use crate::options::{BasisKind, Options};

/// Basis byte naming the partial-dir copy.
pub(crate) const BASIS_PARTIAL_DIR: u8 = 0x81;
/// Basis byte naming a fuzzy match; its name travels as the xname.
pub(crate) const BASIS_FUZZY: u8 = 0x83;

/// Outcome of the basis search for one file.
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum BasisChoice {
    /// An alternate directory already holds this exact file.
    Identical {
        /// What to do with it.
        kind: BasisKind,
        /// The identical copy.
        path: PathBuf,
    },
    /// Request a delta against `path`.
    Delta {
        /// File whose blocks are summed.
        path: PathBuf,
        /// Basis byte, when the destination is not the basis.
        selector: Option<u8>,
        /// Name sent along with a fuzzy basis.
        xname: Option<Vec<u8>>,
    },
    /// Nothing local to build on; the whole file is sent.
    Nothing,
}

/// Whether the local file at `path` already matches `entry`.
pub(crate) fn is_up_to_date(
    options: &Options,
    seed: i32,
    entry: &FileEntry,
    path: &Path,
    meta: &Metadata,
) -> bool {
    if !meta.is_file() || meta.len() != entry.size {
        return false;
    }
    if options.checksum {
        return match (entry.checksum, local_digest(path, seed)) {
            (Some(remote), Ok(local)) => remote == local,
            _ => false,
        };
    }
    if options.size_only {
        return true;
    }
    !options.ignore_times && meta.mtime() == entry.mtime
}

fn local_digest(path: &Path, seed: i32) -> io::Result<[u8; MD4_DIGEST_LEN]> {
    let data = MappedFile::open(path)?;
    Ok(file_digest(&data, seed))
}

/// Where `--partial-dir` keeps the leftovers for `wpath`.
pub(crate) fn partial_path(options: &Options, wpath: &Path) -> Option<PathBuf> {
    let dir = options.partial_dir.as_ref()?;
    let name = wpath.file_name()?;
    let base = if dir.is_absolute() {
        dir.clone()
    } else {
        wpath.parent().unwrap_or_else(|| Path::new(".")).join(dir)
    };
    Some(base.join(name))
}

fn is_regular(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.is_file())
}

/// Picks the basis for a file whose destination is missing or stale.
pub(crate) fn choose_basis(cx: &Context<'_>, entry: &FileEntry, dest_is_file: bool) -> BasisChoice {
    let selectable = cx.protocol.has_item_flags();
    if selectable {
        if let Some(partial) = partial_path(cx.options, &entry.wpath).filter(|p| is_regular(p)) {
            return BasisChoice::Delta {
                path: partial,
                selector: Some(BASIS_PARTIAL_DIR),
                xname: None,
            };
        }
    }
    if dest_is_file {
        return BasisChoice::Delta {
            path: entry.wpath.clone(),
            selector: None,
            xname: None,
        };
    }

    let relative = cx.relative(entry);
    let mut fallback = None;
    for (index, dir) in cx.basis_dirs.iter().enumerate() {
        let candidate = dir.path.join(relative);
        let Ok(meta) = fs::symlink_metadata(&candidate) else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        if is_up_to_date(cx.options, cx.seed, entry, &candidate, &meta) {
            return BasisChoice::Identical {
                kind: dir.kind,
                path: candidate,
            };
        }
        if fallback.is_none() && selectable {
            if let Ok(selector) = u8::try_from(index) {
                fallback = Some(BasisChoice::Delta {
                    path: candidate,
                    selector: Some(selector),
                    xname: None,
                });
            }
        }
    }
    if let Some(choice) = fallback {
        return choice;
    }

    if selectable && cx.options.fuzzy {
        if let (Some(name), Some(parent)) = (entry.wpath.file_name(), entry.wpath.parent()) {
            if let Some(found) = cx.fuzzy.find_basis(name, parent, entry.size, entry.mtime) {
                if let Some(found_name) = found.path.file_name() {
                    return BasisChoice::Delta {
                        xname: Some(found_name.as_bytes().to_vec()),
                        path: found.path.clone(),
                        selector: Some(BASIS_FUZZY),
                    };
                }
            }
        }
    }
    BasisChoice::Nothing
}

/// The basis an echoed request refers to, or `None` when no basis is
/// named and the destination is absent.
pub(crate) fn resolve_basis(
    cx: &Context<'_>,
    entry: &FileEntry,
    request: &FileRequest,
) -> TransferResult<Option<PathBuf>> {
    let path = match request.basis {
        None => Some(entry.wpath.clone()),
        Some(BASIS_PARTIAL_DIR) => partial_path(cx.options, &entry.wpath),
        Some(BASIS_FUZZY) => {
            let xname = request.xname.as_deref().unwrap_or_default();
            let name = Path::new(OsStr::from_bytes(xname));
            let mut components = name.components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(_)), None) => {}
                _ => {
                    return Err(ProtocolError::malformed(
                        "fuzzy basis name",
                        format!("{:?} is not a plain file name", name),
                    )
                    .into());
                }
            }
            entry.wpath.parent().map(|parent| parent.join(name))
        }
        Some(index) => {
            let dir = cx.basis_dirs.get(usize::from(index)).ok_or_else(|| {
                ProtocolError::malformed(
                    "basis byte",
                    format!("{index:#x} with {} basis directories", cx.basis_dirs.len()),
                )
            })?;
            Some(dir.path.join(cx.relative(entry)))
        }
    };
    Ok(path.filter(|p| is_regular(p)))
}

/// Satisfies `entry` from an identical copy in a basis directory.
pub(crate) fn use_identical(
    cx: &Context<'_>,
    entry: &FileEntry,
    kind: BasisKind,
    source: &Path,
) -> TransferResult<()> {
    let dest = &entry.wpath;
    match kind {
        BasisKind::Compare => {
            info_log!(Skip, 2, "{} is uptodate in {}", entry.name.display(), kind.option_name());
        }
        BasisKind::Link => {
            if fs::symlink_metadata(dest).is_ok() {
                fs::remove_file(dest).map_err(|err| TransferError::io("unlink", dest, err))?;
            }
            fs::hard_link(source, dest).map_err(|err| TransferError::io("link", dest, err))?;
            info_log!(Name, 2, "{} => {}", entry.name.display(), source.display());
        }
        BasisKind::Copy => {
            let parent = dest.parent().unwrap_or_else(|| Path::new("."));
            let name = dest.file_name().unwrap_or_else(|| OsStr::new("file"));
            let input = File::open(source).map_err(|err| TransferError::io("open", source, err))?;
            let temp = TempFile::create_in(parent, name)?;
            copy_file_contents(&input, temp.file(), entry.size)
                .map_err(|err| TransferError::io("copy", temp.path(), err))?;
            set_metadata(
                entry,
                MetadataTarget::Open(temp.file(), temp.path()),
                true,
                &cx.metadata,
            )?;
            temp.persist(dest)?;
            info_log!(Name, 1, "{}", entry.name.display());
        }
    }
    Ok(())
}
