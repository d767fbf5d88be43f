//! crates/transfer/src/bootstrap/mod.rs
//!
//! Turns operands into a running session.
//!
//! The client decides the direction from which operands are remote: local
//! copies run both roles in this process, pulls receive from a remote
//! shell or daemon, and pushes send to a remote shell. A server started
//! with `--server` runs its role over stdin and stdout.

mod args;
mod daemon;
mod endpoint;
mod local;
mod remote;

use std::path::{Path, PathBuf};

use batch::script::write_replay_script;
use batch::{BatchHeader, BatchWriter, open_batch};
use logging::{debug_log, info_log};
use protocol::TransferStats;

pub use self::args::server_args;
pub use self::endpoint::{DEFAULT_DAEMON_PORT, Endpoint, EndpointError};

use self::daemon::DaemonTarget;
use self::local::LocalSender;
use self::remote::RemoteShell;
use crate::error::{TransferError, TransferResult};
use crate::options::Options;
use crate::receiver::run_receiver;
use crate::sender::{SenderOutcome, run_sender};
use crate::session::{Connection, Role, Session};

/// Program name written into batch replay scripts.
const PROGRAM: &str = "orsync";

/// Runs a client transfer from `sources` to `dest`.
pub fn run_client(options: &Options, sources: &[String], dest: &str) -> TransferResult<()> {
    options.validate()?;
    if let Some(batch) = &options.read_batch {
        return replay_batch(options, batch, Path::new(dest));
    }
    if sources.is_empty() {
        return Err(TransferError::Usage("no source files given".into()));
    }
    let parsed = sources
        .iter()
        .map(|s| Endpoint::parse(s))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| TransferError::Usage(err.to_string()))?;
    let target = Endpoint::parse(dest).map_err(|err| TransferError::Usage(err.to_string()))?;
    let remote = parsed.iter().filter(|e| !e.is_local()).count();

    match (remote, &target) {
        (0, Endpoint::Local(dest)) => copy_locally(options, &parsed, dest),
        (0, _) => push(options, &parsed, &target),
        (n, Endpoint::Local(dest)) if n == parsed.len() => {
            if !parsed.iter().all(|e| e.same_host(&parsed[0])) {
                return Err(TransferError::Usage(
                    "all remote sources must name the same host".into(),
                ));
            }
            pull(options, &parsed, dest)
        }
        (n, Endpoint::Local(_)) if n > 0 => Err(TransferError::Usage(
            "local and remote sources cannot be mixed".into(),
        )),
        _ => Err(TransferError::Usage(
            "The source and destination cannot both be remote.".into(),
        )),
    }
}

/// Runs the role `--server` asked for on stdin and stdout.
///
/// `paths` are the operands after the `.` placeholder: sources when
/// sending, the destination when receiving.
pub fn serve(options: &Options, sender: bool, paths: &[String]) -> TransferResult<()> {
    let conn = Connection::stdio().map_err(|err| TransferError::ipc("stdio", err))?;
    let role = if sender { Role::sender(options) } else { Role::receiver() };
    let mut session = Session::server(conn, options, role)?;
    let paths = match paths.split_first() {
        Some((first, rest)) if first == "." => rest,
        _ => paths,
    };
    let paths: Vec<PathBuf> = paths.iter().map(PathBuf::from).collect();
    run_server_role(&mut session, &paths)
}

/// Drives a server session; fatal errors are reported to the client
/// before they are returned.
pub(crate) fn run_server_role(session: &mut Session<'_>, paths: &[PathBuf]) -> TransferResult<()> {
    if session.role().is_sender() {
        let outcome = run_sender(session, paths).inspect_err(|err| session.report_fatal(err))?;
        sender_result(session, &outcome)
    } else {
        let dest = paths.first().cloned().unwrap_or_else(|| PathBuf::from("."));
        let summary = run_receiver(session, &dest).inspect_err(|err| session.report_fatal(err))?;
        let remote = session.total_errors();
        summary.into_result(remote)
    }
}

fn copy_locally(options: &Options, sources: &[Endpoint], dest: &Path) -> TransferResult<()> {
    let paths = sources
        .iter()
        .filter_map(|e| match e {
            Endpoint::Local(path) => Some(path.clone()),
            _ => None,
        })
        .collect();
    let (conn, sender) = LocalSender::spawn(options, paths)?;
    let client = Session::client(conn, options, Role::receiver())
        .and_then(|mut session| receive(&mut session, dest));
    sender.join(client)
}

fn pull(options: &Options, sources: &[Endpoint], dest: &Path) -> TransferResult<()> {
    let mut args = server_args(options, true);
    args.extend(sources.iter().map(Endpoint::remote_path));
    match &sources[0] {
        Endpoint::Remote { user, host, .. } => {
            let (conn, shell) = RemoteShell::spawn(options, user.as_deref(), host, &args)?;
            let result = Session::client(conn, options, Role::receiver())
                .and_then(|mut session| receive(&mut session, dest));
            shell.finish(result)
        }
        Endpoint::Daemon {
            user,
            host,
            port,
            module,
            ..
        } => {
            let target = DaemonTarget {
                user: user.as_deref(),
                host,
                port: *port,
                module,
            };
            let (conn, protocol) = daemon::connect(options, target, &args)?;
            let mut session =
                Session::after_daemon_preamble(conn, options, Role::receiver(), protocol)?;
            receive(&mut session, dest)
        }
        Endpoint::Local(_) => Err(TransferError::Usage("no remote source".into())),
    }
}

fn push(options: &Options, sources: &[Endpoint], dest: &Endpoint) -> TransferResult<()> {
    if options.batch_output().is_some() {
        return Err(TransferError::Usage(
            "--write-batch is only supported when receiving".into(),
        ));
    }
    let paths: Vec<PathBuf> = sources
        .iter()
        .filter_map(|e| match e {
            Endpoint::Local(path) => Some(path.clone()),
            _ => None,
        })
        .collect();
    let mut args = server_args(options, false);
    args.push(dest.remote_path());
    match dest {
        Endpoint::Remote { user, host, .. } => {
            let (conn, shell) = RemoteShell::spawn(options, user.as_deref(), host, &args)?;
            let result = Session::client(conn, options, Role::sender(options))
                .and_then(|mut session| send(&mut session, &paths));
            shell.finish(result)
        }
        Endpoint::Daemon {
            user,
            host,
            port,
            module,
            ..
        } => {
            let target = DaemonTarget {
                user: user.as_deref(),
                host,
                port: *port,
                module,
            };
            let (conn, protocol) = daemon::connect(options, target, &args)?;
            let role = Role::sender(options);
            let mut session = Session::after_daemon_preamble(conn, options, role, protocol)?;
            send(&mut session, &paths)
        }
        Endpoint::Local(_) => Err(TransferError::Usage("no remote destination".into())),
    }
}

/// Client receiver: optionally records a batch, then folds the outcome.
fn receive(session: &mut Session<'_>, dest: &Path) -> TransferResult<()> {
    let options = session.options;
    let batch = match options.batch_output() {
        Some(path) => {
            let header = BatchHeader {
                flags: options.batch_flags(),
                protocol: session.protocol(),
                seed: session.seed(),
            };
            session.record_into(Box::new(BatchWriter::create(path, &header)?));
            Some(path)
        }
        None => None,
    };

    let summary = run_receiver(session, dest)?;
    if let Some(path) = batch {
        session
            .stop_recording()
            .map_err(|err| TransferError::io("write batch", path, err))?;
        let args = replay_args(options, path);
        let script = write_replay_script(path, PROGRAM, &args, &dest.to_string_lossy())?;
        info_log!(Misc, 1, "wrote batch replay script {}", script.display());
    }
    if let Some(stats) = &summary.stats {
        report_stats(stats, stats.total_read, stats.total_written);
    }
    let remote = session.total_errors();
    summary.into_result(remote)
}

/// Client sender.
fn send(session: &mut Session<'_>, sources: &[PathBuf]) -> TransferResult<()> {
    let outcome = run_sender(session, sources)?;
    report_stats(&outcome.stats, outcome.stats.total_written, outcome.stats.total_read);
    sender_result(session, &outcome)
}

fn sender_result(session: &mut Session<'_>, outcome: &SenderOutcome) -> TransferResult<()> {
    let errors = session.total_errors();
    if errors > 0 || outcome.io_error != 0 {
        return Err(TransferError::Partial {
            errors,
            io_error: outcome.io_error,
        });
    }
    Ok(())
}

/// `--read-batch`: replays a recording as if a sender were connected.
fn replay_batch(options: &Options, batch: &Path, dest: &Path) -> TransferResult<()> {
    let (header, recorded) = open_batch(batch)?;
    let mut replay = options.clone();
    replay.apply_batch_flags(header.flags);
    debug_log!(Io, 1, "replaying {} at protocol {}", batch.display(), header.protocol);
    let mut session = Session::replay(recorded, &replay, header.protocol, header.seed)?;
    let summary = run_receiver(&mut session, dest)?;
    if let Some(stats) = &summary.stats {
        report_stats(stats, stats.total_read, stats.total_written);
    }
    summary.into_result(0)
}

/// Client-side options for the replay script; the script itself turns
/// the batch-writing option into `--read-batch`.
fn replay_args(options: &Options, batch: &Path) -> Vec<String> {
    let mut args: Vec<String> = server_args(options, false)
        .into_iter()
        .filter(|arg| arg != "--server" && arg != "." && arg != "-n")
        .collect();
    args.push(format!("--write-batch={}", batch.display()));
    args
}

fn report_stats(stats: &TransferStats, sent: u64, received: u64) {
    info_log!(Stats, 1, "sent {sent} bytes  received {received} bytes");
    info_log!(
        Stats,
        1,
        "total size is {}  speedup is {:.2}",
        stats.total_size,
        stats.speedup()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_remote_is_a_usage_error() {
        let err = run_client(&Options::default(), &["a:x".to_owned()], "b:y").unwrap_err();
        assert!(matches!(err, TransferError::Usage(_)));
        assert_eq!(err.exit_code().as_i32(), 1);
    }

    #[test]
    fn mixed_sources_are_rejected() {
        let sources = ["local".to_owned(), "host:remote".to_owned()];
        let err = run_client(&Options::default(), &sources, "dest").unwrap_err();
        assert!(matches!(err, TransferError::Usage(_)));
    }

    #[test]
    fn replay_script_options_drop_server_markers() {
        let options = Options {
            recursive: true,
            ..Options::default()
        };
        assert_eq!(
            replay_args(&options, Path::new("/tmp/b")),
            ["-r", "--write-batch=/tmp/b"]
        );
    }
}
