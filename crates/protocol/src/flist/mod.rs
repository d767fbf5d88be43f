//! crates/protocol/src/flist/mod.rs
//!
//! File-list wire format for protocols 27 through 29.
//!
//! Each record starts with a flag byte (two bytes when the extended bit is
//! set) telling which fields repeat the previous record. The list ends with
//! a zero byte, followed by optional uid and gid name tables and the
//! sender's io-error word.

mod entry;
mod flags;
mod idlist;
mod read;
mod sort;
mod state;
mod write;

use std::io::{self, Read, Write};

pub use entry::{EntryFlags, FileEntry, FileKind, HardLinkId};
pub use flags::XmitFlags;
pub use idlist::{IdList, IdMap, IdResolver, NumericIds};
pub use read::FileListReader;
pub use sort::{send_index_map, sort_and_dedup};
pub use write::FileListWriter;

use crate::varint::{read_int, write_int};
use crate::version::ProtocolVersion;

/// Options that change which fields travel in the file list.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FlistOptions {
    /// Negotiated protocol.
    pub protocol: ProtocolVersion,
    /// `--owner`.
    pub preserve_uids: bool,
    /// `--group`.
    pub preserve_gids: bool,
    /// `--links`.
    pub preserve_links: bool,
    /// `--devices`.
    pub preserve_devices: bool,
    /// `--specials`.
    pub preserve_specials: bool,
    /// `--hard-links`.
    pub preserve_hard_links: bool,
    /// `--checksum`.
    pub always_checksum: bool,
    /// `--numeric-ids`.
    pub numeric_ids: bool,
}

/// A decoded file list with the sender's io-error word.
#[derive(Debug, Default)]
pub struct ReceivedList {
    /// Entries in canonical order, duplicates removed.
    pub entries: Vec<FileEntry>,
    /// Sender-side errors while building the list.
    pub io_error: i32,
}

/// Sends `entries` followed by the id tables and `io_error`.
pub fn send_file_list<W: Write + ?Sized>(
    writer: &mut W,
    entries: &[FileEntry],
    options: FlistOptions,
    resolver: &dyn IdResolver,
    io_error: i32,
) -> io::Result<()> {
    let mut encoder = FileListWriter::new(options);
    for entry in entries {
        encoder.write_entry(writer, entry)?;
    }
    encoder.finish(writer, resolver)?;
    write_int(writer, io_error)
}

/// Receives a list sent by [`send_file_list`], maps ids by name, then
/// sorts and deduplicates it.
pub fn recv_file_list<R: Read + ?Sized>(
    reader: &mut R,
    options: FlistOptions,
    resolver: &dyn IdResolver,
) -> io::Result<ReceivedList> {
    let mut decoder = FileListReader::new(options);
    let mut entries = Vec::new();
    while let Some(entry) = decoder.read_entry(reader)? {
        entries.push(entry);
    }
    if !options.numeric_ids {
        if options.preserve_uids {
            let uids = IdMap::read(reader, |name| resolver.uid_by_name(name))?;
            entries.iter_mut().for_each(|e| e.uid = uids.map(e.uid));
        }
        if options.preserve_gids {
            let gids = IdMap::read(reader, |name| resolver.gid_by_name(name))?;
            entries.iter_mut().for_each(|e| e.gid = gids.map(e.gid));
        }
    }
    let io_error = read_int(reader)?;
    sort_and_dedup(&mut entries);
    Ok(ReceivedList { entries, io_error })
}
