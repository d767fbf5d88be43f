//! crates/flist/src/entry.rs
//!
//! Turns a walked path and its `lstat` snapshot into a file-list record.

use std::fs::{self, Metadata};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use checksums::FileDigest;
use fast_io::MappedFile;
use protocol::flist::{FileEntry, FileKind, HardLinkId};

use crate::builder::WalkOptions;
use crate::error::{FileListError, FileListErrorKind};

/// One path found by the walker.
#[derive(Debug)]
pub struct WalkedPath {
    pub(crate) local: PathBuf,
    pub(crate) name: PathBuf,
    pub(crate) metadata: Metadata,
    pub(crate) top_dir: bool,
}

impl WalkedPath {
    /// Where the file lives on this machine.
    #[must_use]
    pub fn local_path(&self) -> &Path {
        &self.local
    }

    /// Name the file travels under.
    #[must_use]
    pub fn name(&self) -> &Path {
        &self.name
    }

    /// The `lstat` snapshot taken when the path was found.
    #[must_use]
    pub const fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Builds the record for this path.
    ///
    /// Symlink targets are read here and whole-file digests computed when
    /// the options ask for them.
    pub fn to_entry(&self, options: &WalkOptions) -> Result<FileEntry, FileListError> {
        let meta = &self.metadata;
        let mut entry = FileEntry::new(self.name.clone(), meta.mode());
        entry.wpath = self.local.clone();
        entry.uid = meta.uid();
        entry.gid = meta.gid();
        entry.mtime = meta.mtime();
        entry.top_dir = self.top_dir;

        match entry.kind() {
            FileKind::Regular => {
                entry.size = meta.len();
                if options.preserve_hard_links && meta.nlink() > 1 {
                    entry.link_id = Some(HardLinkId {
                        dev: meta.dev(),
                        ino: meta.ino(),
                    });
                }
                if let Some(seed) = options.checksum_seed {
                    entry.checksum = Some(self.digest(seed)?);
                }
            }
            FileKind::Symlink => {
                let target = fs::read_link(&self.local).map_err(|err| {
                    FileListError::new(FileListErrorKind::ReadLink, &self.local, err)
                })?;
                entry.size = target.as_os_str().len() as u64;
                entry.link_target = Some(target);
            }
            kind if kind.is_device() || kind.is_special() => entry.rdev = meta.rdev(),
            _ => {}
        }
        Ok(entry)
    }

    fn digest(&self, seed: i32) -> Result<[u8; checksums::MD4_DIGEST_LEN], FileListError> {
        let map = MappedFile::open(&self.local)
            .map_err(|err| FileListError::new(FileListErrorKind::Checksum, &self.local, err))?;
        let mut digest = FileDigest::new(seed);
        digest.update(&map);
        Ok(digest.finalize())
    }
}
