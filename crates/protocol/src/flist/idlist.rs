//! crates/protocol/src/flist/idlist.rs
//!
//! User and group name tables sent after the file list so the receiver can
//! map ids by name rather than by number.

use std::io::{self, Read, Write};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::varint::{read_byte, read_bytes, read_int, write_byte, write_int};

/// Name service used to translate ids.
pub trait IdResolver {
    /// Login name for `uid`.
    fn user_name(&self, uid: u32) -> Option<String>;
    /// Group name for `gid`.
    fn group_name(&self, gid: u32) -> Option<String>;
    /// Local uid for a login name.
    fn uid_by_name(&self, name: &str) -> Option<u32>;
    /// Local gid for a group name.
    fn gid_by_name(&self, name: &str) -> Option<u32>;
}

/// Resolver that knows no names, so every id passes through unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct NumericIds;

impl IdResolver for NumericIds {
    fn user_name(&self, _uid: u32) -> Option<String> {
        None
    }

    fn group_name(&self, _gid: u32) -> Option<String> {
        None
    }

    fn uid_by_name(&self, _name: &str) -> Option<u32> {
        None
    }

    fn gid_by_name(&self, _name: &str) -> Option<u32> {
        None
    }
}

/// Ids seen while sending, in first-seen order.
#[derive(Debug, Default)]
pub struct IdList {
    order: Vec<u32>,
    seen: FxHashSet<u32>,
}

impl IdList {
    /// Records an id. Root is never mapped by name.
    pub fn note(&mut self, id: u32) {
        if id != 0 && self.seen.insert(id) {
            self.order.push(id);
        }
    }

    /// Number of distinct ids noted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no id was noted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Writes `(id, name)` pairs for every id with a known name, then `0`.
    pub fn write<W, F>(&self, writer: &mut W, lookup: F) -> io::Result<()>
    where
        W: Write + ?Sized,
        F: Fn(u32) -> Option<String>,
    {
        for &id in &self.order {
            let Some(name) = lookup(id) else { continue };
            let bytes = &name.as_bytes()[..name.len().min(usize::from(u8::MAX))];
            write_int(writer, id as i32)?;
            write_byte(writer, bytes.len() as u8)?;
            writer.write_all(bytes)?;
        }
        write_int(writer, 0)
    }
}

/// Remote-to-local id translation built from a received name table.
#[derive(Debug, Default, Clone)]
pub struct IdMap {
    map: FxHashMap<u32, u32>,
}

impl IdMap {
    /// Reads a name table terminated by id `0`.
    ///
    /// Names the local system does not know keep their numeric id.
    pub fn read<R, F>(reader: &mut R, lookup: F) -> io::Result<Self>
    where
        R: Read + ?Sized,
        F: Fn(&str) -> Option<u32>,
    {
        let mut map = FxHashMap::default();
        loop {
            let id = read_int(reader)? as u32;
            if id == 0 {
                break;
            }
            let len = usize::from(read_byte(reader)?);
            let name = read_bytes(reader, len)?;
            if let Some(local) = std::str::from_utf8(&name).ok().and_then(&lookup) {
                map.insert(id, local);
            }
        }
        Ok(Self { map })
    }

    /// Local id for a remote one.
    #[must_use]
    pub fn map(&self, remote: u32) -> u32 {
        self.map.get(&remote).copied().unwrap_or(remote)
    }

    /// Number of ids translated by name.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether no id is translated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
