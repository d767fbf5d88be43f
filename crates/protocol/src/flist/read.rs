//! crates/protocol/src/flist/read.rs
//!
//! Receiver side of the file-list codec.

use std::ffi::OsStr;
use std::io::{self, Read};
use std::os::unix::ffi::OsStrExt;
use std::path::{Component, Path, PathBuf};

use logging::{debug_log, warn_log};

use super::FlistOptions;
use super::entry::{FileEntry, FileKind, HardLinkId};
use super::flags::XmitFlags;
use super::state::{MAX_NAME_LEN, Previous, make_rdev};
use crate::error::ProtocolError;
use crate::varint::{read_byte, read_bytes, read_count, read_int, read_longint};

/// Decodes file-list records against the previously received one.
#[derive(Debug)]
pub struct FileListReader {
    options: FlistOptions,
    prev: Previous,
    read: usize,
}

impl FileListReader {
    /// Starts decoding a list for a connection using `options`.
    #[must_use]
    pub fn new(options: FlistOptions) -> Self {
        Self {
            options,
            prev: Previous::default(),
            read: 0,
        }
    }

    /// Entries decoded so far.
    #[must_use]
    pub const fn read(&self) -> usize {
        self.read
    }

    /// Resolves a "same as previous" field. Very old senders set these on
    /// the first entry; the value then defaults to zero.
    fn inherited<T: Copy>(&self, what: &str, value: T) -> T {
        if !self.prev.seen {
            warn_log!("same {what} flag without a previous entry, assuming 0");
        }
        value
    }

    /// Reads one record, or `None` at the end-of-list marker.
    pub fn read_entry<R: Read + ?Sized>(
        &mut self,
        reader: &mut R,
    ) -> io::Result<Option<FileEntry>> {
        let opts = self.options;
        let extended = opts.protocol.has_extended_flist_flags();
        let first = read_byte(reader)?;
        if first == 0 {
            return Ok(None);
        }
        let mut bits = u16::from(first);
        if extended && bits & XmitFlags::EXTENDED_FLAGS != 0 {
            bits |= u16::from(read_byte(reader)?) << 8;
        }
        let flags = XmitFlags::from_bits(bits);

        let same_len = if flags.has(XmitFlags::SAME_NAME) {
            usize::from(read_byte(reader)?)
        } else {
            0
        };
        if same_len > self.prev.name.len() {
            return Err(ProtocolError::malformed(
                "file name",
                format!("prefix of {same_len} bytes exceeds previous name"),
            )
            .into());
        }
        let suffix_len = if flags.has(XmitFlags::LONG_NAME) {
            read_count(reader, "file name length")?
        } else {
            usize::from(read_byte(reader)?)
        };
        if same_len + suffix_len > MAX_NAME_LEN {
            return Err(ProtocolError::malformed(
                "file name length",
                format!("{} bytes", same_len + suffix_len),
            )
            .into());
        }
        let mut name = self.prev.name[..same_len].to_vec();
        name.extend_from_slice(&read_bytes(reader, suffix_len)?);
        let name = validate_name(name)?;

        let size = read_longint(reader)?;
        let size = u64::try_from(size)
            .map_err(|_| ProtocolError::malformed("file size", size.to_string()))?;
        let mtime = if flags.has(XmitFlags::SAME_TIME) {
            self.inherited("mtime", self.prev.mtime)
        } else {
            i64::from(read_int(reader)?)
        };
        let mode = if flags.has(XmitFlags::SAME_MODE) {
            self.inherited("mode", self.prev.mode)
        } else {
            read_int(reader)? as u32
        };
        let kind = FileKind::from_mode(mode);

        let mut entry = FileEntry::new(name, mode);
        entry.size = size;
        entry.mtime = mtime;
        entry.top_dir = flags.has(XmitFlags::TOP_DIR) && kind == FileKind::Directory;

        if opts.preserve_uids {
            entry.uid = if flags.has(XmitFlags::SAME_UID) {
                self.inherited("uid", self.prev.uid)
            } else {
                read_int(reader)? as u32
            };
        }
        if opts.preserve_gids {
            entry.gid = if flags.has(XmitFlags::SAME_GID) {
                self.inherited("gid", self.prev.gid)
            } else {
                read_int(reader)? as u32
            };
        }
        if (opts.preserve_devices && kind.is_device())
            || (opts.preserve_specials && kind.is_special())
        {
            entry.rdev = if extended {
                let major = if flags.has(XmitFlags::SAME_RDEV_MAJOR) {
                    self.inherited("rdev", self.prev.rdev_major)
                } else {
                    read_int(reader)? as u32
                };
                let minor = if flags.has(XmitFlags::RDEV_MINOR_IS_SMALL) {
                    u32::from(read_byte(reader)?)
                } else {
                    read_int(reader)? as u32
                };
                make_rdev(major, minor)
            } else if flags.has(XmitFlags::EXTENDED_FLAGS) {
                // Before protocol 28 this bit means "same rdev".
                self.inherited("rdev", self.prev.rdev)
            } else {
                u64::from(read_int(reader)? as u32)
            };
        }
        if opts.preserve_links && kind == FileKind::Symlink {
            let len = read_count(reader, "symlink length")?;
            if len > MAX_NAME_LEN {
                return Err(ProtocolError::malformed("symlink length", len.to_string()).into());
            }
            let target = read_bytes(reader, len)?;
            entry.link_target = Some(PathBuf::from(OsStr::from_bytes(&target)));
        }
        if !extended {
            if opts.preserve_hard_links && kind == FileKind::Regular {
                let dev = read_longint(reader)? as u64;
                let ino = read_longint(reader)? as u64;
                entry.link_id = (dev != 0 || ino != 0).then_some(HardLinkId { dev, ino });
            }
        } else if flags.has(XmitFlags::HAS_IDEV_DATA) {
            let dev = if flags.has(XmitFlags::SAME_DEV) {
                self.inherited("dev", self.prev.dev)
            } else {
                read_longint(reader)? as u64
            };
            let ino = read_longint(reader)? as u64;
            entry.link_id = Some(HardLinkId { dev, ino });
        }
        if opts.always_checksum && kind == FileKind::Regular {
            let mut sum = [0u8; checksums::MD4_DIGEST_LEN];
            reader.read_exact(&mut sum)?;
            entry.checksum = Some(sum);
        }

        entry.send_index = self.read;
        debug_log!(Flist, 3, "received entry {:?} flags {:#06x}", entry.name, flags.bits());
        self.prev.remember(&entry);
        self.read += 1;
        Ok(Some(entry))
    }
}

/// Rejects names that would escape the destination.
fn validate_name(name: Vec<u8>) -> io::Result<PathBuf> {
    let invalid = |detail: &str| -> io::Error {
        ProtocolError::malformed(
            "file name",
            format!("{detail}: {}", String::from_utf8_lossy(&name)),
        )
        .into()
    };
    if name.is_empty() {
        return Err(invalid("empty"));
    }
    if name.contains(&0) {
        return Err(invalid("embedded NUL"));
    }
    let path = Path::new(OsStr::from_bytes(&name));
    if path
        .components()
        .any(|c| matches!(c, Component::RootDir | Component::ParentDir))
    {
        return Err(invalid("escapes the transfer root"));
    }
    Ok(path.to_path_buf())
}
