//! crates/transfer/src/sender.rs
//!
//! The sending role.
//!
//! After the file list goes out, the sender is driven entirely by the
//! receiver: each request names a file and carries the block sums of the
//! receiver's basis, and the answer is the echoed request, the sum head,
//! the token stream and the whole-file digest. A `-1` index ends a phase;
//! the sender echoes it until the last phase, then closes with its own
//! `-1`, the totals (when serving) and waits for the receiver's goodbye.

use std::io::Write;
use std::path::PathBuf;

use checksums::file_digest;
use fast_io::MappedFile;
use flist::FileListBuilder;
use logging::{debug_log, error_log, info_log};
use matching::{BlockMatcher, TokenEncoder};
use metadata::SystemIds;
use protocol::flist::{FileEntry, FileKind, IdResolver, NumericIds, send_file_list};
use protocol::poll::wait_writable;
use protocol::varint::{read_int, write_int};
use protocol::{FileRequest, ItemFlags, MAX_CHUNK, ProtocolError, TransferStats, WriteMode};
use signature::{SumHead, read_block_set};

use crate::error::TransferResult;
#[cfg(feature = "tracing")]
use tracing::instrument;
use crate::session::Session;

/// What the sending side learned by the end of a run.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct SenderOutcome {
    /// Totals as this end counted them.
    pub stats: TransferStats,
    /// Walk errors, before `--ignore-errors` masked them for the peer.
    pub io_error: i32,
}

/// Runs the sender over `sources` until the receiver says goodbye.
#[cfg_attr(feature = "tracing", instrument(skip_all, fields(sources = sources.len())))]
pub(crate) fn run_sender(
    session: &mut Session<'_>,
    sources: &[PathBuf],
) -> TransferResult<SenderOutcome> {
    session.exchange_filter_list()?;
    let options = session.options;
    let list = FileListBuilder::new(options.walk_options(session.seed))
        .sources(sources)
        .build();
    let advertised = if options.ignore_errors { 0 } else { list.io_error };
    let resolver: &dyn IdResolver = if options.numeric_ids { &NumericIds } else { &SystemIds };
    send_file_list(
        &mut session.writer,
        &list.entries,
        options.flist_options(session.protocol),
        resolver,
        advertised,
    )?;
    session.writer.flush()?;
    info_log!(Flist, 1, "{} files to consider", list.entries.len());

    let mut sender = Sender {
        encoder: options.token_encoder(session.protocol)?,
        entries: list.entries,
        append: options.append,
    };
    session.writer.set_mode(WriteMode::Deferred);
    sender.serve_requests(session)?;

    let stats = TransferStats {
        total_read: session.reader.bytes_read(),
        total_written: session.writer.bytes_written(),
        total_size: sender.entries.iter().map(|e| e.size).sum(),
    };
    write_int(&mut session.writer, -1)?;
    if session.server {
        stats.write(&mut session.writer)?;
    }
    session.forward_logs()?;
    session.writer.flush()?;

    session.wait_for_input()?;
    let goodbye = read_int(&mut session.reader)?;
    if goodbye != -1 {
        return Err(
            ProtocolError::malformed("goodbye", format!("expected -1, got {goodbye}")).into(),
        );
    }
    debug_log!(Send, 1, "sender finished: {stats:?}");
    Ok(SenderOutcome {
        stats,
        io_error: list.io_error,
    })
}

struct Sender {
    encoder: TokenEncoder,
    entries: Vec<FileEntry>,
    append: bool,
}

impl Sender {
    fn serve_requests(&mut self, session: &mut Session<'_>) -> TransferResult<()> {
        let max_phase = session.protocol.max_phase();
        let mut phase = 0;
        loop {
            session.writer.flush()?;
            session.wait_for_input()?;
            let index = read_int(&mut session.reader)?;
            if index == -1 {
                phase += 1;
                if phase > max_phase {
                    return Ok(());
                }
                debug_log!(Send, 1, "send_files phase={phase}");
                write_int(&mut session.writer, -1)?;
                continue;
            }
            let request =
                FileRequest::read_after_index(&mut session.reader, index, session.protocol)?;
            self.send_file(session, request)?;
        }
    }

    fn send_file(&mut self, session: &mut Session<'_>, request: FileRequest) -> TransferResult<()> {
        let entry = usize::try_from(request.index)
            .ok()
            .and_then(|i| self.entries.get(i))
            .ok_or_else(|| {
                ProtocolError::malformed(
                    "file index",
                    format!("{} outside a list of {}", request.index, self.entries.len()),
                )
            })?;
        if !request.iflags.has(ItemFlags::TRANSFER) {
            debug_log!(Send, 2, "{}: no transfer requested", entry.name.display());
            return Ok(());
        }
        let set = read_block_set(&mut session.reader, self.append)?;
        if entry.kind() != FileKind::Regular {
            return Err(ProtocolError::malformed(
                "file request",
                format!("{} is not a regular file", entry.name.display()),
            )
            .into());
        }

        let data = match MappedFile::open(&entry.wpath) {
            Ok(data) => data,
            Err(err) => {
                error_log!("send_files failed to open {}: {err}", entry.wpath.display());
                session.note_error();
                return Ok(());
            }
        };
        debug_log!(
            Send,
            1,
            "send_files({}, {}) against {} blocks",
            request.index,
            entry.name.display(),
            set.count()
        );

        request.write(&mut session.writer, session.protocol)?;
        SumHead::of(&set).write(&mut session.writer)?;
        self.encoder.begin()?;
        let data = data.as_slice();
        if self.append {
            let start = usize::try_from(set.size()).map_or(data.len(), |s| s.min(data.len()));
            for chunk in data[start..].chunks(MAX_CHUNK) {
                self.encoder.literal(&mut session.writer, chunk)?;
                drain_backlog(session)?;
            }
        } else {
            let mut matcher = BlockMatcher::new(data, &set, session.seed);
            while let Some(event) = matcher.next_event()? {
                self.encoder.emit(&mut session.writer, data, &event)?;
                drain_backlog(session)?;
            }
            let stats = matcher.stats();
            debug_log!(
                Deltasum,
                1,
                "{}: {} matched blocks, {} literal bytes, {} false alarms",
                entry.name.display(),
                stats.matched_blocks,
                stats.literal_bytes,
                stats.false_alarms
            );
        }
        self.encoder.finish(&mut session.writer)?;
        // The digest always covers the whole file, appended or not.
        session.writer.write_all(&file_digest(data, session.seed))?;
        Ok(())
    }
}

/// Keeps at most one chunk queued, waiting on the descriptor when it is
/// full.
fn drain_backlog(session: &mut Session<'_>) -> TransferResult<()> {
    while session.writer.queued_len() >= MAX_CHUNK {
        session.check_interrupt()?;
        if !session.writer.try_flush()? {
            let fd = session.writer.fd();
            wait_writable(&fd, session.options.timeout)?;
        }
    }
    Ok(())
}
