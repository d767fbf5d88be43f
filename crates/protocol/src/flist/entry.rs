//! crates/protocol/src/flist/entry.rs
//!
//! File-list records and their lifecycle flags.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use checksums::MD4_DIGEST_LEN;

const S_IFMT: u32 = 0o170_000;
const S_IFSOCK: u32 = 0o140_000;
const S_IFLNK: u32 = 0o120_000;
const S_IFREG: u32 = 0o100_000;
const S_IFBLK: u32 = 0o060_000;
const S_IFDIR: u32 = 0o040_000;
const S_IFCHR: u32 = 0o020_000;
const S_IFIFO: u32 = 0o010_000;

/// File type carried in the mode bits of an entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FileKind {
    /// Regular file.
    Regular,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
    /// Character device.
    CharDevice,
    /// Block device.
    BlockDevice,
    /// Named pipe.
    Fifo,
    /// Unix-domain socket.
    Socket,
    /// Anything else the mode bits encode.
    Unknown,
}

impl FileKind {
    /// Classifies raw `st_mode` bits.
    #[must_use]
    pub const fn from_mode(mode: u32) -> Self {
        match mode & S_IFMT {
            S_IFREG => Self::Regular,
            S_IFDIR => Self::Directory,
            S_IFLNK => Self::Symlink,
            S_IFCHR => Self::CharDevice,
            S_IFBLK => Self::BlockDevice,
            S_IFIFO => Self::Fifo,
            S_IFSOCK => Self::Socket,
            _ => Self::Unknown,
        }
    }

    /// The `S_IFMT` bits for this kind.
    #[must_use]
    pub const fn mode_bits(self) -> u32 {
        match self {
            Self::Regular => S_IFREG,
            Self::Directory => S_IFDIR,
            Self::Symlink => S_IFLNK,
            Self::CharDevice => S_IFCHR,
            Self::BlockDevice => S_IFBLK,
            Self::Fifo => S_IFIFO,
            Self::Socket => S_IFSOCK,
            Self::Unknown => 0,
        }
    }

    /// Character or block device.
    #[must_use]
    pub const fn is_device(self) -> bool {
        matches!(self, Self::CharDevice | Self::BlockDevice)
    }

    /// Fifo or socket.
    #[must_use]
    pub const fn is_special(self) -> bool {
        matches!(self, Self::Fifo | Self::Socket)
    }
}

/// Lifecycle bits of a [`FileEntry`].
///
/// `SUCCESS` and `FAILED` are never set together, and `REDO` is cleared by
/// whichever terminal outcome follows it. The mutators enforce this so
/// callers cannot build an inconsistent set.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct EntryFlags(u8);

impl EntryFlags {
    /// Transfer work for the entry has finished in this phase.
    pub const COMPLETE: u8 = 1 << 0;
    /// Digest mismatch: retry in the redo phase.
    pub const REDO: u8 = 1 << 1;
    /// Reconstructed and verified.
    pub const SUCCESS: u8 = 1 << 2;
    /// Terminally failed.
    pub const FAILED: u8 = 1 << 3;
    /// Success reported back to the sender.
    pub const SUCCESS_ACKED: u8 = 1 << 4;

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether every bit in `mask` is set.
    #[must_use]
    pub const fn contains(self, mask: u8) -> bool {
        self.0 & mask == mask
    }

    /// Marks the phase's work for this entry as done.
    pub fn mark_complete(&mut self) {
        self.0 |= Self::COMPLETE;
    }

    /// Schedules a redo, clearing any earlier outcome.
    pub fn mark_redo(&mut self) {
        self.0 = (self.0 & !(Self::SUCCESS | Self::FAILED | Self::SUCCESS_ACKED)) | Self::REDO;
    }

    /// Records a verified transfer.
    pub fn mark_success(&mut self) {
        self.0 = (self.0 & !(Self::REDO | Self::FAILED)) | Self::SUCCESS;
    }

    /// Records a terminal failure.
    pub fn mark_failed(&mut self) {
        self.0 = (self.0 & !(Self::REDO | Self::SUCCESS | Self::SUCCESS_ACKED)) | Self::FAILED;
    }

    /// Records that the sender has been told about the success.
    ///
    /// Ignored unless the entry succeeded.
    pub fn mark_acked(&mut self) {
        if self.contains(Self::SUCCESS) {
            self.0 |= Self::SUCCESS_ACKED;
        }
    }

    /// Clears `COMPLETE` so the entry is eligible in the next phase.
    pub fn reopen(&mut self) {
        self.0 &= !Self::COMPLETE;
    }
}

/// Device/inode pair identifying a hard-link group.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct HardLinkId {
    /// Device number.
    pub dev: u64,
    /// Inode number.
    pub ino: u64,
}

/// One file-list record.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FileEntry {
    /// Path relative to the sender's transfer root, as sent on the wire.
    pub name: PathBuf,
    /// Local path: where the sender reads the file, or where the receiver
    /// writes it relative to the destination root.
    pub wpath: PathBuf,
    /// Raw mode bits including the file type.
    pub mode: u32,
    /// Owner.
    pub uid: u32,
    /// Group.
    pub gid: u32,
    /// Size in bytes.
    pub size: u64,
    /// Modification time, seconds since the epoch.
    pub mtime: i64,
    /// Device number for device nodes and specials.
    pub rdev: u64,
    /// Symlink target.
    pub link_target: Option<PathBuf>,
    /// Hard-link identity when hard links are preserved.
    pub link_id: Option<HardLinkId>,
    /// Whole-file digest when checksums are exchanged.
    pub checksum: Option<[u8; MD4_DIGEST_LEN]>,
    /// Lifecycle bits.
    pub flags: EntryFlags,
    /// Position in the sender's transmitted order.
    pub send_index: usize,
    /// Itemization bits last exchanged for this entry.
    pub iflags: u16,
    /// Named directly on the command line.
    pub top_dir: bool,
}

impl FileEntry {
    /// Builds an entry with the given name and mode; other fields default.
    #[must_use]
    pub fn new(name: impl Into<PathBuf>, mode: u32) -> Self {
        let name = name.into();
        Self {
            wpath: name.clone(),
            name,
            mode,
            ..Self::default()
        }
    }

    /// File type from the mode bits.
    #[must_use]
    pub const fn kind(&self) -> FileKind {
        FileKind::from_mode(self.mode)
    }

    /// Permission bits only.
    #[must_use]
    pub const fn permissions(&self) -> u32 {
        self.mode & !S_IFMT
    }

    /// Name as raw bytes.
    #[must_use]
    pub fn name_bytes(&self) -> &[u8] {
        self.name.as_os_str().as_bytes()
    }

    /// Whether this entry is the root of the transfer (`.`).
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.name_bytes() == b"."
    }

    /// Whether `path` lies strictly inside this entry's directory.
    #[must_use]
    pub fn contains_path(&self, path: &Path) -> bool {
        if self.is_root() {
            return path.as_os_str() != OsStr::new(".");
        }
        path.starts_with(&self.name) && path != self.name
    }
}
