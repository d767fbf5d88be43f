//! crates/transfer/src/receiver/mod.rs
//!
//! The receiving role.
//!
//! After the file list arrives the receiver runs two state machines from
//! a single poll loop. The [`uploader`] walks the list and writes requests
//! with block sums; the [`downloader`] reads the sender's answers and
//! rebuilds files. Neither waits for the other, so a large list never
//! stalls with both ends blocked on a full pipe.

mod basis;
mod delayed;
mod delete;
mod downloader;
mod links;
mod uploader;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use flist::HardLinkGroups;
use logging::{debug_log, error_log, info_log, warn_log};
use matching::FuzzyMatcher;
use metadata::{MetadataOptions, MetadataTarget, SystemIds, set_metadata};
use protocol::flist::{
    FileEntry, FileKind, IdResolver, NumericIds, recv_file_list, send_index_map,
};
use protocol::poll::{Interest, poll_set};
use protocol::varint::write_int;
use protocol::{
    MAX_CHUNK, MessageCode, ProtocolVersion, TransferStats, WireReader, WireWriter, WriteMode,
};
use rsync_core::ExitCode;

use self::delayed::DelayedUpdates;
use self::delete::delete_extraneous;
use self::downloader::{DownloadStep, Downloader};
use self::links::link_followers;
use self::uploader::Uploader;
use crate::error::{TransferError, TransferResult};
use crate::options::{BasisDir, Options};
use crate::session::{POLL_TICK, Session, timed_out};
#[cfg(feature = "tracing")]
use tracing::instrument;

/// State shared by both halves of the receiver.
pub(crate) struct Context<'a> {
    pub options: &'a Options,
    pub protocol: ProtocolVersion,
    pub seed: i32,
    /// Directory names in the list are relative to.
    pub root: PathBuf,
    pub metadata: MetadataOptions,
    pub links: HardLinkGroups,
    /// Alternate basis directories, resolved against `root`.
    pub basis_dirs: Vec<BasisDir>,
    pub fuzzy: FuzzyMatcher,
    pub delayed: DelayedUpdates,
    /// Per-file failures seen locally.
    pub errors: u32,
}

impl Context<'_> {
    /// `entry`'s path below the destination root.
    pub(crate) fn relative<'e>(&self, entry: &'e FileEntry) -> &'e Path {
        entry.wpath.strip_prefix(&self.root).unwrap_or(&entry.name)
    }
}

/// How a receiving run ended, when it ended without a fatal error.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ReceiverSummary {
    /// Per-file errors counted on this side.
    pub errors: u32,
    /// The sender's io-error word.
    pub io_error: i32,
    /// Totals the server sender reported, on a client.
    pub stats: Option<TransferStats>,
    /// Deletions withheld by `--max-delete`.
    pub delete_skipped: u64,
}

impl ReceiverSummary {
    /// Folds the outcome into the error the run should end with.
    pub(crate) fn into_result(self, remote_errors: u32) -> TransferResult<()> {
        let errors = self.errors + remote_errors;
        if errors > 0 || self.io_error != 0 {
            return Err(TransferError::Partial {
                errors,
                io_error: self.io_error,
            });
        }
        if self.delete_skipped > 0 {
            return Err(TransferError::DeleteLimit {
                skipped: self.delete_skipped,
            });
        }
        Ok(())
    }
}

/// Runs the receiver, placing the sender's files under `dest`.
#[cfg_attr(feature = "tracing", instrument(skip_all, fields(dest = %dest.display())))]
pub(crate) fn run_receiver(
    session: &mut Session<'_>,
    dest: &Path,
) -> TransferResult<ReceiverSummary> {
    session.exchange_filter_list()?;
    let options = session.options;
    let resolver: &dyn IdResolver = if options.numeric_ids { &NumericIds } else { &SystemIds };
    let flist_options = options.flist_options(session.protocol);
    let received = recv_file_list(&mut session.reader, flist_options, resolver)?;
    let mut entries = received.entries;
    info_log!(Flist, 1, "received {} names", entries.len());
    let index_map = send_index_map(&entries);

    let root = place_entries(&mut entries, dest, options)?;
    let mut cx = Context {
        options,
        protocol: session.protocol,
        seed: session.seed,
        basis_dirs: options
            .basis_dirs
            .iter()
            .map(|dir| BasisDir {
                kind: dir.kind,
                path: root.join(&dir.path),
            })
            .collect(),
        root,
        metadata: options.metadata_options(),
        links: if options.preserve_hard_links {
            HardLinkGroups::from_entries(&entries)
        } else {
            HardLinkGroups::default()
        },
        fuzzy: FuzzyMatcher::new(),
        delayed: DelayedUpdates::default(),
        errors: 0,
    };

    let mut summary = ReceiverSummary {
        io_error: received.io_error,
        ..ReceiverSummary::default()
    };
    if options.delete {
        let outcome = delete_extraneous(&entries, options, received.io_error);
        debug_log!(Del, 1, "deleted {} entries", outcome.deleted);
        cx.errors += outcome.errors;
        summary.delete_skipped = outcome.skipped;
        if outcome.skipped > 0 {
            warn_log!("Deletions stopped due to --max-delete limit ({} skipped)", outcome.skipped);
        }
    }

    let mut uploader = Uploader::new();
    let mut downloader = Downloader::new(
        options.token_decoder(session.protocol),
        index_map,
        session.protocol.max_phase(),
    );
    session.writer.set_mode(WriteMode::Deferred);
    if let Err(err) = exchange(session, &mut cx, &mut entries, &mut uploader, &mut downloader) {
        downloader.salvage(&mut cx, &entries);
        return Err(err);
    }

    link_followers(&mut cx, &entries);
    if options.writes_destination() {
        finish_directories(&mut cx, &entries);
    }
    cx.errors += cx.delayed.apply();
    cx.delayed.cleanup();

    if !session.server {
        let stats = TransferStats::read(&mut session.reader)?;
        summary.stats = Some(stats);
    }
    session.forward_logs()?;
    if session.server && summary.delete_skipped > 0 {
        // The client only learns about the limit through the exit code.
        let code = ExitCode::DeleteLimit.as_i32();
        session.writer.write_message(MessageCode::ErrorExit, &code.to_le_bytes())?;
    }
    write_int(&mut session.writer, -1)?;
    session.writer.flush()?;
    summary.errors = cx.errors;
    Ok(summary)
}

/// Gives every entry its local path and returns the root the list is
/// relative to.
///
/// A single non-directory entry may be renamed by the destination; any
/// other list lands inside `dest`, which is created if missing.
fn place_entries(
    entries: &mut [FileEntry],
    dest: &Path,
    options: &Options,
) -> TransferResult<PathBuf> {
    let dest_is_dir = fs::metadata(dest).is_ok_and(|m| m.is_dir());
    let names_dir = dest.as_os_str().as_encoded_bytes().ends_with(b"/");
    if let [single] = entries {
        if single.kind() != FileKind::Directory && !dest_is_dir && !names_dir {
            single.wpath = dest.to_path_buf();
            let root = dest
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
            return Ok(root);
        }
    }
    if !dest_is_dir && options.writes_destination() {
        fs::create_dir_all(dest).map_err(|err| TransferError::io("mkdir", dest, err))?;
        info_log!(Misc, 1, "created directory {}", dest.display());
    }
    for entry in entries.iter_mut() {
        entry.wpath = if entry.is_root() {
            dest.to_path_buf()
        } else {
            dest.join(&entry.name)
        };
    }
    Ok(dest.to_path_buf())
}

/// The poll loop: runs until the downloader sees the last phase close.
fn exchange(
    session: &mut Session<'_>,
    cx: &mut Context<'_>,
    entries: &mut [FileEntry],
    uploader: &mut Uploader,
    downloader: &mut Downloader,
) -> TransferResult<()> {
    let timeout = cx.options.timeout;
    let mut idle_since = Instant::now();
    loop {
        session.check_interrupt()?;
        session.forward_logs()?;

        while !uploader.is_finished() && session.writer.queued_len() < MAX_CHUNK {
            uploader.step(cx, entries, &mut session.writer)?;
        }
        session.writer.try_flush()?;

        while session.reader.has_buffered_data()? || downloader.has_pending() {
            match downloader.step(cx, entries, &mut session.reader)? {
                DownloadStep::Continue => {}
                DownloadStep::PhaseDone(phase) => {
                    cx.errors += cx.delayed.apply();
                    uploader.next_phase(phase, entries);
                }
                DownloadStep::Done => {
                    debug_log!(Recv, 1, "receiver finished all phases");
                    return Ok(());
                }
            }
            idle_since = Instant::now();
            if !uploader.is_finished() && session.writer.queued_len() < MAX_CHUNK {
                break;
            }
        }

        let wants_write = session.writer.has_pending();
        let (readable, writable) = wait(&session.reader, &session.writer, wants_write)?;
        if readable && session.reader.pump()? > 0 {
            idle_since = Instant::now();
        }
        if writable && session.writer.try_flush()? {
            idle_since = Instant::now();
        }

        if let Some(limit) = timeout {
            if idle_since.elapsed() >= limit {
                return Err(timed_out(limit).into());
            }
            session.writer.keepalive(limit / 2)?;
        }
    }
}

fn wait(
    reader: &WireReader<File>,
    writer: &WireWriter<File>,
    wants_write: bool,
) -> TransferResult<(bool, bool)> {
    let read_fd = reader.fd();
    let write_fd = writer.fd();
    let mut interests = vec![Interest::read(&read_fd)];
    if wants_write {
        interests.push(Interest::write(&write_fd));
    }
    let ready = poll_set(&interests, Some(POLL_TICK))?;
    let readable = ready.first().is_some_and(|r| r.readable || r.hangup);
    let writable = ready.get(1).is_some_and(|r| r.writable || r.hangup);
    Ok((readable, writable))
}

/// Applies directory metadata last, deepest first, so that writing into
/// a directory does not disturb its times.
fn finish_directories(cx: &mut Context<'_>, entries: &[FileEntry]) {
    for entry in entries.iter().rev().filter(|e| e.kind() == FileKind::Directory) {
        let target = MetadataTarget::Path(&entry.wpath);
        if let Err(err) = set_metadata(entry, target, false, &cx.metadata) {
            error_log!("{err}");
            cx.errors += 1;
        }
    }
}
