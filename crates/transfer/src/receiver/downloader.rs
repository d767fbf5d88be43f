//! crates/transfer/src/receiver/downloader.rs
//!
//! Half of the receiver that rebuilds files from the sender's tokens.
//!
//! `ReadNext` takes the echoed request and sum head, `ReadLocal` opens the
//! basis and the output, and `ReadRemote` applies tokens until the end
//! marker and digest arrive. A step never waits on the connection for
//! more than the bytes of the token it has started.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use checksums::{FileDigest, MD4_DIGEST_LEN};
use fast_io::MappedFile;
use logging::{debug_log, error_log, info_log, warn_log};
use matching::{MatchError, Token, TokenDecoder};
use metadata::{MetadataTarget, TempFile, move_file, set_metadata};
use protocol::flist::FileEntry;
use protocol::varint::read_int;
use protocol::{FileRequest, ItemFlags, ProtocolError, WireReader};
use signature::{BlockSet, SumHead, read_blocks};

use super::Context;
use super::basis::{BASIS_PARTIAL_DIR, partial_path, resolve_basis};
use crate::error::{TransferError, TransferResult};

/// Result of one downloader step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum DownloadStep {
    /// More work may be possible with the bytes already buffered.
    Continue,
    /// The sender closed a phase; the payload is the new phase number.
    PhaseDone(u32),
    /// The sender closed the last phase.
    Done,
}

/// Where reconstructed bytes go.
enum Output {
    /// New contents at a temporary name.
    Temp(TempFile),
    /// The destination itself, for `--inplace` and `--append`.
    InPlace(File),
    /// Nowhere: the tokens are only consumed.
    Discard,
}

struct Transfer {
    index: usize,
    request: FileRequest,
    set: BlockSet,
    basis: MappedFile,
    output: Output,
    digest: FileDigest,
    is_new: bool,
    /// A local failure already counted; the tokens are drained regardless.
    failed: bool,
}

enum State {
    ReadNext,
    ReadLocal(Box<Transfer>),
    ReadRemote(Box<Transfer>),
}

/// The apply side of the receiver.
pub(crate) struct Downloader {
    state: State,
    phase: u32,
    max_phase: u32,
    decoder: TokenDecoder,
    index_map: Vec<Option<usize>>,
}

impl Downloader {
    pub(crate) fn new(
        decoder: TokenDecoder,
        index_map: Vec<Option<usize>>,
        max_phase: u32,
    ) -> Self {
        Self {
            state: State::ReadNext,
            phase: 0,
            max_phase,
            decoder,
            index_map,
        }
    }

    /// Whether decoded output is waiting that needs no new input.
    pub(crate) fn has_pending(&self) -> bool {
        matches!(self.state, State::ReadLocal(_))
            || (matches!(self.state, State::ReadRemote(_)) && self.decoder.has_pending())
    }

    /// Performs one state transition.
    pub(crate) fn step(
        &mut self,
        cx: &mut Context<'_>,
        entries: &mut [FileEntry],
        reader: &mut WireReader<File>,
    ) -> TransferResult<DownloadStep> {
        match std::mem::replace(&mut self.state, State::ReadNext) {
            State::ReadNext => self.read_next(cx, entries, reader),
            State::ReadLocal(transfer) => {
                let transfer = self.open_local(cx, &entries[transfer.index], transfer)?;
                self.state = State::ReadRemote(transfer);
                Ok(DownloadStep::Continue)
            }
            State::ReadRemote(mut transfer) => {
                if self.read_token(cx, &entries[transfer.index], &mut transfer, reader)? {
                    self.finish_file(cx, &mut entries[transfer.index], *transfer, reader)?;
                } else {
                    self.state = State::ReadRemote(transfer);
                }
                Ok(DownloadStep::Continue)
            }
        }
    }

    fn read_next(
        &mut self,
        cx: &Context<'_>,
        entries: &[FileEntry],
        reader: &mut WireReader<File>,
    ) -> TransferResult<DownloadStep> {
        let index = read_int(reader)?;
        if index == -1 {
            self.phase += 1;
            debug_log!(Recv, 1, "recv_files phase={}", self.phase);
            return Ok(if self.phase > self.max_phase {
                DownloadStep::Done
            } else {
                DownloadStep::PhaseDone(self.phase)
            });
        }
        let local = usize::try_from(index)
            .ok()
            .and_then(|i| self.index_map.get(i).copied().flatten())
            .ok_or_else(|| {
                ProtocolError::malformed("file index", format!("{index} is not in the file list"))
            })?;
        let request = FileRequest::read_after_index(reader, index, cx.protocol)?;
        let head = SumHead::read(reader)?;
        let set = read_blocks(reader, head, true)?;
        debug_log!(
            Recv,
            2,
            "recv_files({}) with {} blocks of {}",
            entries[local].name.display(),
            set.count(),
            set.block_len()
        );
        self.state = State::ReadLocal(Box::new(Transfer {
            index: local,
            request,
            set,
            basis: MappedFile::empty(),
            output: Output::Discard,
            digest: FileDigest::new(cx.seed),
            is_new: false,
            failed: false,
        }));
        Ok(DownloadStep::Continue)
    }

    fn open_local(
        &mut self,
        cx: &mut Context<'_>,
        entry: &FileEntry,
        mut transfer: Box<Transfer>,
    ) -> TransferResult<Box<Transfer>> {
        let options = cx.options;
        let path = &entry.wpath;
        transfer.is_new = if cx.protocol.has_item_flags() {
            transfer.request.iflags.has(ItemFlags::IS_NEW)
        } else {
            std::fs::symlink_metadata(path).is_err()
        };
        self.decoder.begin(transfer.set.count())?;

        let needs_basis = transfer.set.count() > 0 || options.append;
        if needs_basis {
            match resolve_basis(cx, entry, &transfer.request)? {
                Some(basis) => match open_basis(
                    &basis,
                    options.inplace && transfer.request.basis.is_none(),
                ) {
                    Ok(data) => transfer.basis = data,
                    Err(err) => transfer.fail(cx, "open basis", &basis, err),
                },
                None if transfer.set.count() > 0 => {
                    transfer.fail(cx, "open basis", path, io::Error::from(io::ErrorKind::NotFound));
                }
                None => {}
            }
        }

        if !options.writes_destination() || transfer.failed {
            return Ok(transfer);
        }
        if options.append {
            // The digest covers the whole file, including what is kept.
            let have = transfer.basis.len();
            let keep = usize::try_from(transfer.set.size()).map_or(have, |n| n.min(have));
            transfer.digest.update(&transfer.basis[..keep]);
            match open_in_place(path, Some(transfer.set.size())) {
                Ok(file) => transfer.output = Output::InPlace(file),
                Err(err) => transfer.fail(cx, "open", path, err),
            }
        } else if options.inplace {
            match open_in_place(path, None) {
                Ok(file) => transfer.output = Output::InPlace(file),
                Err(err) => transfer.fail(cx, "open", path, err),
            }
        } else {
            let dir = match &options.temp_dir {
                Some(dir) => dir.clone(),
                None => path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf),
            };
            let name = path.file_name().unwrap_or_default();
            match TempFile::create_in(&dir, name) {
                Ok(temp) => transfer.output = Output::Temp(temp),
                Err(err) => {
                    let (context, at, source) = err.into_parts();
                    transfer.fail(cx, context, &at, source);
                }
            }
        }
        Ok(transfer)
    }

    /// Applies one token; returns `true` at the end marker.
    fn read_token(
        &mut self,
        cx: &mut Context<'_>,
        entry: &FileEntry,
        transfer: &mut Transfer,
        reader: &mut WireReader<File>,
    ) -> TransferResult<bool> {
        match self.decoder.next_token(reader)? {
            None => Ok(true),
            Some(Token::Literal(bytes)) => {
                transfer.digest.update(bytes);
                let written = transfer.output.write(bytes);
                transfer.check(cx, &entry.wpath, written);
                Ok(false)
            }
            Some(Token::Block(index)) => {
                let range = transfer.set.range_of(index).ok_or(MatchError::BlockOutOfRange {
                    index: index as i64,
                    count: transfer.set.count(),
                })?;
                let start = usize::try_from(range.start).unwrap_or(usize::MAX);
                let end = usize::try_from(range.end).unwrap_or(usize::MAX);
                if let Some(bytes) = transfer.basis.get(start..end) {
                    transfer.digest.update(bytes);
                    let written = transfer.output.write(bytes);
                    self.decoder.see_block(bytes)?;
                    transfer.check(cx, &entry.wpath, written);
                } else {
                    if !transfer.failed {
                        let path = entry.wpath.display();
                        error_log!("{path}: basis is shorter than block {index}");
                        cx.errors += 1;
                        transfer.failed = true;
                        transfer.output = Output::Discard;
                    }
                    self.decoder.see_block(&vec![0u8; end.saturating_sub(start)])?;
                }
                Ok(false)
            }
        }
    }

    fn finish_file(
        &mut self,
        cx: &mut Context<'_>,
        entry: &mut FileEntry,
        transfer: Transfer,
        reader: &mut WireReader<File>,
    ) -> TransferResult<()> {
        let mut expected = [0u8; MD4_DIGEST_LEN];
        reader.read_exact(&mut expected)?;
        let Transfer {
            request,
            output,
            digest,
            is_new,
            failed,
            ..
        } = transfer;
        if failed {
            entry.flags.mark_failed();
            keep_partial(cx, entry, output);
            return Ok(());
        }
        if !cx.options.writes_destination() {
            info_log!(Name, 1, "{}", entry.name.display());
            entry.flags.mark_success();
            return Ok(());
        }
        if digest.finalize() != expected {
            if self.phase == 0 {
                warn_log!(
                    "{}: failed verification -- update discarded (will try again).",
                    entry.name.display()
                );
                entry.flags.mark_redo();
            } else {
                error_log!("{}: failed verification -- update discarded.", entry.name.display());
                cx.errors += 1;
                entry.flags.mark_failed();
                keep_partial(cx, entry, output);
            }
            return Ok(());
        }

        let path = entry.wpath.clone();
        let placed = match output {
            Output::Temp(temp) => {
                let target = MetadataTarget::Open(temp.file(), temp.path());
                if let Err(err) = set_metadata(entry, target, is_new, &cx.metadata) {
                    error_log!("{err}");
                    cx.errors += 1;
                }
                if cx.options.delay_updates {
                    cx.delayed.stage(temp, &path)
                } else {
                    temp.persist(&path).map_err(TransferError::from)
                }
            }
            Output::InPlace(file) => finish_in_place(cx, entry, &file, &path, is_new),
            Output::Discard => Ok(()),
        };
        if let Err(err) = placed {
            error_log!("{err}");
            cx.errors += 1;
            entry.flags.mark_failed();
            return Ok(());
        }
        if request.basis == Some(BASIS_PARTIAL_DIR) {
            if let Some(partial) = partial_path(cx.options, &path) {
                let _ = std::fs::remove_file(partial);
            }
        }
        info_log!(Name, 1, "{}", entry.name.display());
        entry.flags.mark_success();
        Ok(())
    }

    /// Keeps what an interrupted transfer had written, when asked to.
    pub(crate) fn salvage(&mut self, cx: &mut Context<'_>, entries: &[FileEntry]) {
        let state = std::mem::replace(&mut self.state, State::ReadNext);
        if let State::ReadRemote(transfer) = state {
            if let Some(entry) = entries.get(transfer.index) {
                keep_partial(cx, entry, transfer.output);
            }
        }
    }
}

impl Transfer {
    fn fail(&mut self, cx: &mut Context<'_>, context: &str, path: &Path, err: io::Error) {
        error_log!("{context} {}: {err}", path.display());
        cx.errors += 1;
        self.failed = true;
        self.output = Output::Discard;
    }

    fn check(&mut self, cx: &mut Context<'_>, path: &Path, written: io::Result<()>) {
        if let Err(err) = written {
            self.fail(cx, "write", path, err);
        }
    }
}

impl Output {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Self::Temp(temp) => temp.file_mut().write_all(bytes),
            Self::InPlace(file) => file.write_all(bytes),
            Self::Discard => Ok(()),
        }
    }
}

fn open_basis(path: &Path, private: bool) -> io::Result<MappedFile> {
    let file = File::open(path)?;
    if private {
        MappedFile::read_private(&file)
    } else {
        MappedFile::map(&file)
    }
}

fn open_in_place(path: &Path, append_at: Option<u64>) -> io::Result<File> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .mode(0o600)
        .open(path)?;
    file.seek(SeekFrom::Start(append_at.unwrap_or(0)))?;
    Ok(file)
}

fn finish_in_place(
    cx: &Context<'_>,
    entry: &FileEntry,
    file: &File,
    path: &Path,
    is_new: bool,
) -> TransferResult<()> {
    let mut handle = file;
    let end = handle.stream_position().map_err(|err| TransferError::io("seek", path, err))?;
    file.set_len(end).map_err(|err| TransferError::io("truncate", path, err))?;
    set_metadata(entry, MetadataTarget::Open(file, path), is_new, &cx.metadata)?;
    Ok(())
}

/// Puts an unfinished temp file where `--partial` or `--partial-dir` want
/// it; without either it is dropped.
fn keep_partial(cx: &Context<'_>, entry: &FileEntry, output: Output) {
    let Output::Temp(temp) = output else {
        return;
    };
    if !cx.options.keeps_partial() || temp.file().metadata().map_or(true, |m| m.len() == 0) {
        return;
    }
    let target = match partial_path(cx.options, &entry.wpath) {
        Some(target) => {
            if let Some(dir) = target.parent() {
                if let Err(err) = std::fs::create_dir_all(dir) {
                    error_log!("mkdir {}: {err}", dir.display());
                    return;
                }
            }
            target
        }
        None => entry.wpath.clone(),
    };
    let kept = temp.keep();
    match move_file(&kept, &target, true) {
        Ok(()) => debug_log!(Recv, 1, "kept partial {}", target.display()),
        Err(err) => {
            error_log!("{err}");
            let _ = std::fs::remove_file(&kept);
        }
    }
}
