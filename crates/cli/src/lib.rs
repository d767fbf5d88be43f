#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `cli` is the command-line front end of `orsync`. It parses rsync's
//! option spellings with a [`clap`](https://docs.rs/clap/) builder,
//! produces a [`transfer::Options`], and hands the operands to
//! [`transfer::run_client`], or to [`transfer::serve`] when invoked with
//! `--server` by a peer.
//!
//! # Environment
//!
//! - `RSYNC_RSH` is the remote shell when `-e`/`--rsh` is not given.
//! - `RSYNC_PASSWORD` is sent to daemons that ask for authentication,
//!   unless `--password-file` names a file instead.
//!
//! # Output
//!
//! A client prints informational diagnostics on stdout and warnings and
//! errors on stderr, including those its peer forwarded. A server leaves
//! stdout to the protocol: its diagnostics travel to the client in
//! multiplexed frames.
//!
//! # Examples
//!
//! ```
//! assert_eq!(cli::run(["orsync", "--version"]), 0);
//! assert_eq!(cli::run(["orsync", "--no-such-option"]), 1);
//! ```

mod command;
mod parse;

use std::ffi::OsString;
use std::io::{self, Write};

use logging::{DiagnosticEvent, VerbosityConfig};
use protocol::PROTOCOL_VERSION;
use rsync_core::{ExitCode, install_signal_handlers};
use transfer::{TransferError, run_client, serve};

use crate::command::{PROGRAM_NAME, clap_command};
use crate::parse::{Invocation, parse_args};

/// Maximum exit code representable by a Unix process.
const MAX_EXIT_CODE: i32 = u8::MAX as i32;

/// Runs the command line in `arguments`, the first of which is the
/// program name, and returns the process exit status.
pub fn run<I, S>(arguments: I) -> i32
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let invocation = match parse_args(arguments) {
        Ok(invocation) => invocation,
        Err(err) => {
            let _ = writeln!(io::stderr(), "{PROGRAM_NAME}: {}", err.to_string().trim_end());
            return report_exit(ExitCode::Syntax);
        }
    };

    match invocation {
        Invocation::Help => {
            let help = clap_command().render_help();
            if write!(io::stdout(), "{help}").is_err() {
                return ExitCode::MessageIo.as_i32();
            }
            0
        }
        Invocation::Version => {
            let banner = format!(
                "{PROGRAM_NAME} version {}  protocol version {PROTOCOL_VERSION}\n",
                env!("CARGO_PKG_VERSION")
            );
            if io::stdout().write_all(banner.as_bytes()).is_err() {
                return ExitCode::MessageIo.as_i32();
            }
            0
        }
        Invocation::Client {
            options,
            verbosity,
            sources,
            dest,
        } => {
            start_logging(verbosity, true);
            finish(run_client(&options, &sources, &dest))
        }
        Invocation::Server {
            options,
            verbosity,
            sender,
            paths,
        } => {
            start_logging(verbosity, false);
            finish(serve(&options, sender, &paths))
        }
    }
}

/// Converts a numeric exit code into an [`std::process::ExitCode`].
#[must_use]
pub fn exit_code_from(status: i32) -> std::process::ExitCode {
    let clamped = status.clamp(0, MAX_EXIT_CODE);
    std::process::ExitCode::from(clamped as u8)
}

fn start_logging(verbosity: VerbosityConfig, client: bool) {
    logging::init(verbosity);
    #[cfg(feature = "tracing")]
    logging::init_tracing(&verbosity);
    if client {
        logging::set_sink(Box::new(print_event));
    }
    if let Err(err) = install_signal_handlers() {
        logging::warn_log!("could not install signal handlers: {err}");
    }
}

fn print_event(event: &DiagnosticEvent) {
    // Output failures have nowhere left to be reported.
    let _ = match event {
        DiagnosticEvent::Info { .. } => writeln!(io::stdout(), "{event}"),
        _ => writeln!(io::stderr(), "{event}"),
    };
}

fn finish(result: Result<(), TransferError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            let code = err.exit_code();
            // Partial transfers were already reported file by file.
            if !matches!(err, TransferError::Partial { .. }) {
                let _ = writeln!(io::stderr(), "{PROGRAM_NAME}: {err}");
            }
            report_exit(code)
        }
    }
}

fn report_exit(code: ExitCode) -> i32 {
    let _ = writeln!(
        io::stderr(),
        "rsync error: {} (code {})",
        code.description(),
        code.as_i32()
    );
    code.as_i32()
}
