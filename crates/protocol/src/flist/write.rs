//! crates/protocol/src/flist/write.rs
//!
//! Sender side of the file-list codec.

use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;

use logging::debug_log;

use super::FlistOptions;
use super::entry::{FileEntry, FileKind};
use super::flags::XmitFlags;
use super::idlist::{IdList, IdResolver};
use super::state::{Previous, rdev_major, rdev_minor};
use crate::varint::{write_byte, write_int, write_longint, write_shortint};

/// Encodes file-list records against the previously sent one.
#[derive(Debug)]
pub struct FileListWriter {
    options: FlistOptions,
    prev: Previous,
    uids: IdList,
    gids: IdList,
    written: usize,
}

impl FileListWriter {
    /// Starts a list for a connection using `options`.
    #[must_use]
    pub fn new(options: FlistOptions) -> Self {
        Self {
            options,
            prev: Previous::default(),
            uids: IdList::default(),
            gids: IdList::default(),
            written: 0,
        }
    }

    /// Entries written so far.
    #[must_use]
    pub const fn written(&self) -> usize {
        self.written
    }

    fn carries_rdev(&self, kind: FileKind) -> bool {
        (self.options.preserve_devices && kind.is_device())
            || (self.options.preserve_specials && kind.is_special())
    }

    fn flags_for(&self, entry: &FileEntry, same_len: usize, suffix_len: usize) -> XmitFlags {
        let opts = &self.options;
        let prev = &self.prev;
        let kind = entry.kind();
        let extended = opts.protocol.has_extended_flist_flags();
        let mut flags = XmitFlags::default();

        if entry.top_dir && kind == FileKind::Directory {
            flags.set(XmitFlags::TOP_DIR);
        }
        if prev.seen {
            if entry.mode == prev.mode {
                flags.set(XmitFlags::SAME_MODE);
            }
            if opts.preserve_uids && entry.uid == prev.uid {
                flags.set(XmitFlags::SAME_UID);
            }
            if opts.preserve_gids && entry.gid == prev.gid {
                flags.set(XmitFlags::SAME_GID);
            }
            if entry.mtime == prev.mtime {
                flags.set(XmitFlags::SAME_TIME);
            }
            if extended && self.carries_rdev(kind) && rdev_major(entry.rdev) == prev.rdev_major {
                flags.set(XmitFlags::SAME_RDEV_MAJOR);
            }
        }
        if extended && opts.preserve_hard_links && kind != FileKind::Directory {
            if let Some(id) = entry.link_id {
                flags.set(XmitFlags::HAS_IDEV_DATA);
                if prev.seen && id.dev == prev.dev {
                    flags.set(XmitFlags::SAME_DEV);
                }
            }
        }
        if same_len > 0 {
            flags.set(XmitFlags::SAME_NAME);
        }
        if suffix_len > usize::from(u8::MAX) {
            flags.set(XmitFlags::LONG_NAME);
        }
        flags
    }

    /// Writes one record.
    pub fn write_entry<W: Write + ?Sized>(
        &mut self,
        writer: &mut W,
        entry: &FileEntry,
    ) -> io::Result<()> {
        let opts = self.options;
        let kind = entry.kind();
        let name = entry.name_bytes();
        let same_len = self.prev.shared_prefix(name);
        let suffix = &name[same_len..];
        let mut flags = self.flags_for(entry, same_len, suffix.len());

        if opts.protocol.has_extended_flist_flags() {
            if kind != FileKind::Directory && flags.is_empty() {
                flags.set(XmitFlags::TOP_DIR);
            }
            if flags.needs_extended() || flags.is_empty() {
                flags.set(XmitFlags::EXTENDED_FLAGS);
                write_shortint(writer, flags.bits())?;
            } else {
                write_byte(writer, flags.bits() as u8)?;
            }
        } else {
            if flags.is_empty() {
                flags.set(if kind == FileKind::Directory {
                    XmitFlags::LONG_NAME
                } else {
                    XmitFlags::TOP_DIR
                });
            }
            write_byte(writer, flags.bits() as u8)?;
        }

        if flags.has(XmitFlags::SAME_NAME) {
            write_byte(writer, same_len as u8)?;
        }
        if flags.has(XmitFlags::LONG_NAME) {
            write_int(writer, suffix.len() as i32)?;
        } else {
            write_byte(writer, suffix.len() as u8)?;
        }
        writer.write_all(suffix)?;
        write_longint(writer, entry.size as i64)?;
        if !flags.has(XmitFlags::SAME_TIME) {
            // Protocols before 30 carry a 32-bit mtime.
            write_int(writer, entry.mtime as i32)?;
        }
        if !flags.has(XmitFlags::SAME_MODE) {
            write_int(writer, entry.mode as i32)?;
        }
        if opts.preserve_uids {
            if !flags.has(XmitFlags::SAME_UID) {
                write_int(writer, entry.uid as i32)?;
            }
            self.uids.note(entry.uid);
        }
        if opts.preserve_gids {
            if !flags.has(XmitFlags::SAME_GID) {
                write_int(writer, entry.gid as i32)?;
            }
            self.gids.note(entry.gid);
        }
        if self.carries_rdev(kind) {
            if opts.protocol.has_extended_flist_flags() {
                if !flags.has(XmitFlags::SAME_RDEV_MAJOR) {
                    write_int(writer, rdev_major(entry.rdev) as i32)?;
                }
                write_int(writer, rdev_minor(entry.rdev) as i32)?;
            } else {
                write_int(writer, entry.rdev as i32)?;
            }
        }
        if opts.preserve_links && kind == FileKind::Symlink {
            let target = entry
                .link_target
                .as_deref()
                .map(|t| t.as_os_str().as_bytes())
                .unwrap_or_default();
            write_int(writer, target.len() as i32)?;
            writer.write_all(target)?;
        }
        if opts.preserve_hard_links {
            if !opts.protocol.has_extended_flist_flags() {
                if kind == FileKind::Regular {
                    let id = entry.link_id.unwrap_or_default();
                    write_longint(writer, id.dev as i64)?;
                    write_longint(writer, id.ino as i64)?;
                }
            } else if let Some(id) = entry.link_id.filter(|_| flags.has(XmitFlags::HAS_IDEV_DATA)) {
                if !flags.has(XmitFlags::SAME_DEV) {
                    write_longint(writer, id.dev as i64)?;
                }
                write_longint(writer, id.ino as i64)?;
            }
        }
        if opts.always_checksum && kind == FileKind::Regular {
            writer.write_all(&entry.checksum.unwrap_or_default())?;
        }

        debug_log!(Flist, 3, "sent entry {:?} flags {:#06x}", entry.name, flags.bits());
        self.prev.remember(entry);
        self.written += 1;
        Ok(())
    }

    /// Writes the end marker followed by the uid/gid name tables.
    pub fn finish<W: Write + ?Sized>(
        &self,
        writer: &mut W,
        resolver: &dyn IdResolver,
    ) -> io::Result<()> {
        write_byte(writer, 0)?;
        if self.options.numeric_ids {
            return Ok(());
        }
        if self.options.preserve_uids {
            self.uids.write(writer, |uid| resolver.user_name(uid))?;
        }
        if self.options.preserve_gids {
            self.gids.write(writer, |gid| resolver.group_name(gid))?;
        }
        Ok(())
    }
}
