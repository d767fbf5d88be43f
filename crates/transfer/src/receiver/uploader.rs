//! crates/transfer/src/receiver/uploader.rs
//!
//! Half of the receiver that walks the file list and asks for data.
//!
//! Each step either handles one entry locally (directories, links,
//! specials, up-to-date files) or queues a request carrying the block sums
//! of the chosen basis. Queued requests leave in [`MAX_CHUNK`] pieces so
//! the poll loop can keep reading while a large set of sums goes out.

use std::fs::{self, DirBuilder, File, Metadata};
use std::io::{self, Write};
use std::os::unix::fs::{DirBuilderExt, MetadataExt};
use std::path::Path;

use fast_io::MappedFile;
use logging::{debug_log, error_log, info_log};
use metadata::{MetadataTarget, create_special, set_metadata};
use protocol::flist::{EntryFlags, FileEntry, FileKind};
use protocol::varint::write_int;
use protocol::{FileRequest, ItemFlags, MAX_CHUNK, WireWriter};
use signature::{
    BlockSet, SignatureError, SignatureLayoutParams, SumHead, calculate_signature_layout,
    generate_block_set, write_block_set,
};

use super::Context;
use super::basis::{BasisChoice, choose_basis, is_up_to_date, use_identical};
use super::links::make_symlink;
use crate::error::{TransferError, TransferResult};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum UploadState {
    FindNext,
    Write,
    Finished,
}

/// What handling one entry produced.
enum Prepared {
    /// Nothing to request in this phase.
    Done,
    /// Encoded request and sums for the sender.
    Request(Vec<u8>),
}

/// The request side of the receiver.
#[derive(Debug)]
pub(crate) struct Uploader {
    state: UploadState,
    phase: u32,
    cursor: usize,
    queued: Vec<u8>,
    sent: usize,
}

impl Uploader {
    pub(crate) const fn new() -> Self {
        Self {
            state: UploadState::FindNext,
            phase: 0,
            cursor: 0,
            queued: Vec::new(),
            sent: 0,
        }
    }

    /// Whether this phase's list has been walked and closed with `-1`.
    pub(crate) fn is_finished(&self) -> bool {
        self.state == UploadState::Finished
    }

    /// Starts `phase`. The redo phase revisits entries whose digest failed.
    pub(crate) fn next_phase(&mut self, phase: u32, entries: &mut [FileEntry]) {
        self.phase = phase;
        self.cursor = 0;
        self.state = UploadState::FindNext;
        if phase == 1 {
            for entry in entries.iter_mut().filter(|e| e.flags.contains(EntryFlags::REDO)) {
                entry.flags.reopen();
            }
        }
        debug_log!(Genr, 1, "uploader entering phase {phase}");
    }

    /// Advances by one request or, at the end of the list, the phase
    /// marker.
    pub(crate) fn step(
        &mut self,
        cx: &mut Context<'_>,
        entries: &mut [FileEntry],
        writer: &mut WireWriter<File>,
    ) -> TransferResult<()> {
        match self.state {
            UploadState::Finished => Ok(()),
            UploadState::Write => {
                let end = (self.sent + MAX_CHUNK).min(self.queued.len());
                writer.write_all(&self.queued[self.sent..end])?;
                self.sent = end;
                if self.sent == self.queued.len() {
                    self.queued.clear();
                    self.sent = 0;
                    self.state = UploadState::FindNext;
                }
                Ok(())
            }
            UploadState::FindNext => {
                while self.cursor < entries.len() {
                    let index = self.cursor;
                    self.cursor += 1;
                    // Only the redo phase revisits entries; later phases
                    // just close.
                    let redo = entries[index].flags.contains(EntryFlags::REDO);
                    if self.phase > 1 || (self.phase == 1 && !redo) {
                        continue;
                    }
                    match self.prepare(cx, &entries[index], index) {
                        Ok(Prepared::Done) => entries[index].flags.mark_complete(),
                        Ok(Prepared::Request(bytes)) => {
                            self.queued = bytes;
                            self.sent = 0;
                            self.state = UploadState::Write;
                            return Ok(());
                        }
                        Err(err) => {
                            error_log!("{err}");
                            cx.errors += 1;
                            entries[index].flags.mark_failed();
                            entries[index].flags.mark_complete();
                        }
                    }
                }
                write_int(writer, -1)?;
                self.state = UploadState::Finished;
                debug_log!(Genr, 1, "uploader finished phase {}", self.phase);
                Ok(())
            }
        }
    }

    fn prepare(
        &self,
        cx: &mut Context<'_>,
        entry: &FileEntry,
        index: usize,
    ) -> TransferResult<Prepared> {
        match entry.kind() {
            FileKind::Directory => prepare_directory(cx, entry).map(|()| Prepared::Done),
            FileKind::Symlink => make_symlink(cx, entry).map(|()| Prepared::Done),
            FileKind::Regular => self.prepare_file(cx, entry, index),
            _ => prepare_special(cx, entry).map(|()| Prepared::Done),
        }
    }

    fn prepare_file(
        &self,
        cx: &mut Context<'_>,
        entry: &FileEntry,
        index: usize,
    ) -> TransferResult<Prepared> {
        let options = cx.options;
        if options.preserve_hard_links && cx.links.is_follower(index) {
            debug_log!(Hlink, 2, "{} waits for its leader", entry.name.display());
            return Ok(Prepared::Done);
        }
        let path = &entry.wpath;
        let dest = fs::symlink_metadata(path).ok();
        if dest.as_ref().is_some_and(Metadata::is_dir) {
            return Err(TransferError::io(
                "replace",
                path,
                io::Error::new(io::ErrorKind::IsADirectory, "a directory is in the way"),
            ));
        }
        let dest_file = dest.filter(Metadata::is_file);

        if self.phase == 0 {
            if let Some(meta) = &dest_file {
                if is_up_to_date(options, cx.seed, entry, path, meta) {
                    info_log!(Skip, 2, "{} is uptodate", entry.name.display());
                    if options.writes_destination() {
                        set_metadata(entry, MetadataTarget::Path(path), false, &cx.metadata)?;
                    }
                    return Ok(Prepared::Done);
                }
                if options.append && meta.len() >= entry.size {
                    let name = entry.name.display();
                    info_log!(Skip, 1, "{name} is not shorter than the source, skipped");
                    return Ok(Prepared::Done);
                }
            }
        }

        let choice = if options.append {
            match &dest_file {
                Some(_) => BasisChoice::Delta {
                    path: path.clone(),
                    selector: None,
                    xname: None,
                },
                None => BasisChoice::Nothing,
            }
        } else {
            choose_basis(cx, entry, dest_file.is_some())
        };

        if let BasisChoice::Identical { kind, path: source } = &choice {
            if options.writes_destination() {
                use_identical(cx, entry, *kind, source)?;
            } else {
                info_log!(Name, 1, "{}", entry.name.display());
            }
            return Ok(Prepared::Done);
        }
        if options.dry_run {
            info_log!(Name, 1, "{}", entry.name.display());
            return Ok(Prepared::Done);
        }

        let mut request = FileRequest::transfer(entry.send_index as i32);
        if dest_file.is_none() {
            request.iflags.set(ItemFlags::IS_NEW);
        }
        let mut buf = Vec::new();
        match choice {
            BasisChoice::Delta { path: basis, selector, xname } => {
                request.basis = selector;
                request.xname = xname;
                request.write(&mut buf, cx.protocol)?;
                let set = self.block_set(cx, &basis)?;
                debug_log!(
                    Genr,
                    2,
                    "{}: {} blocks of {} against {}",
                    entry.name.display(),
                    set.count(),
                    set.block_len(),
                    basis.display()
                );
                write_block_set(&mut buf, &set, options.append)?;
            }
            BasisChoice::Nothing | BasisChoice::Identical { .. } => {
                request.write(&mut buf, cx.protocol)?;
                SumHead::empty().write(&mut buf)?;
            }
        }
        Ok(Prepared::Request(buf))
    }

    fn block_set(&self, cx: &Context<'_>, basis: &Path) -> TransferResult<BlockSet> {
        let options = cx.options;
        let csum_len = options.csum_length(self.phase);
        if options.append {
            let len = fs::metadata(basis)
                .map_err(|err| TransferError::io("stat", basis, err))?
                .len();
            let params = SignatureLayoutParams::new(len, options.block_size, csum_len);
            let layout = calculate_signature_layout(params).map_err(SignatureError::from)?;
            return Ok(BlockSet::new(layout, Vec::new()));
        }
        if options.whole_file {
            let layout = SumHead::empty().layout();
            return Ok(BlockSet::new(layout, Vec::new()));
        }
        let data = MappedFile::open(basis).map_err(|err| TransferError::io("open", basis, err))?;
        let layout = calculate_signature_layout(SignatureLayoutParams::new(
            data.len() as u64,
            options.block_size,
            csum_len,
        ))
        .map_err(SignatureError::from)?;
        Ok(generate_block_set(&data, layout, cx.seed)?)
    }
}

fn prepare_directory(cx: &Context<'_>, entry: &FileEntry) -> TransferResult<()> {
    let path = &entry.wpath;
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => return Ok(()),
        Ok(_) => {
            if cx.options.writes_destination() {
                fs::remove_file(path).map_err(|err| TransferError::io("unlink", path, err))?;
            }
        }
        Err(_) => {}
    }
    if !entry.is_root() {
        info_log!(Name, 1, "{}/", entry.name.display());
    }
    if !cx.options.writes_destination() {
        return Ok(());
    }
    DirBuilder::new()
        .mode(entry.permissions() | 0o700)
        .create(path)
        .map_err(|err| TransferError::io("mkdir", path, err))
}

fn prepare_special(cx: &Context<'_>, entry: &FileEntry) -> TransferResult<()> {
    let kind = entry.kind();
    let wanted = if kind.is_device() {
        cx.options.preserve_devices
    } else {
        cx.options.preserve_specials
    };
    if !wanted {
        info_log!(Nonreg, 1, "skipping non-regular file \"{}\"", entry.name.display());
        return Ok(());
    }
    let path = &entry.wpath;
    if let Ok(meta) = fs::symlink_metadata(path) {
        let same_kind = FileKind::from_mode(meta.mode()) == kind;
        if same_kind && (!kind.is_device() || meta.rdev() == entry.rdev) {
            if cx.options.writes_destination() {
                set_metadata(entry, MetadataTarget::Path(path), false, &cx.metadata)?;
            }
            return Ok(());
        }
        if meta.is_dir() {
            return Err(TransferError::io(
                "replace",
                path,
                io::Error::new(io::ErrorKind::IsADirectory, "a directory is in the way"),
            ));
        }
        if cx.options.writes_destination() {
            fs::remove_file(path).map_err(|err| TransferError::io("unlink", path, err))?;
        }
    }
    info_log!(Name, 1, "{}", entry.name.display());
    if !cx.options.writes_destination() {
        return Ok(());
    }
    create_special(entry, path)?;
    set_metadata(entry, MetadataTarget::Path(path), true, &cx.metadata)?;
    Ok(())
}
