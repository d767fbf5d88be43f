//! crates/core/src/signal.rs
//!
//! Interrupt flags polled by the transfer loops.
//!
//! Signal handlers only store into atomics. The loops check
//! [`is_shutdown_requested`] between iterations and unwind through their
//! normal error paths, so temporary files are cleaned up by ordinary drops
//! rather than from signal context. A second signal of the same family
//! terminates the process immediately with [`ExitCode::Signal`].

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};

use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::flag;

use crate::exit_code::ExitCode;

/// Why a run is being torn down early.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ShutdownReason {
    /// SIGINT.
    Interrupted = 1,
    /// SIGTERM.
    Terminated = 2,
    /// SIGHUP.
    HangUp = 3,
    /// Requested by the program itself.
    UserRequested = 4,
}

impl ShutdownReason {
    const fn from_code(code: usize) -> Option<Self> {
        match code {
            1 => Some(Self::Interrupted),
            2 => Some(Self::Terminated),
            3 => Some(Self::HangUp),
            4 => Some(Self::UserRequested),
            _ => None,
        }
    }

    /// Exit status for a run ended this way.
    #[must_use]
    pub const fn exit_code(self) -> ExitCode {
        ExitCode::Signal
    }

    /// Short description for messages.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Interrupted => "interrupted by SIGINT",
            Self::Terminated => "terminated by SIGTERM",
            Self::HangUp => "hangup by SIGHUP",
            Self::UserRequested => "shutdown requested",
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

struct Flags {
    requested: Arc<AtomicBool>,
    reason: Arc<AtomicUsize>,
}

static FLAGS: LazyLock<Flags> = LazyLock::new(|| Flags {
    requested: Arc::new(AtomicBool::new(false)),
    reason: Arc::new(AtomicUsize::new(0)),
});

/// Installs handlers for SIGINT, SIGTERM and SIGHUP.
///
/// The first signal sets the shutdown flag and records its reason; a
/// second one exits at once.
pub fn install_signal_handlers() -> io::Result<()> {
    for (signal, reason) in [
        (SIGINT, ShutdownReason::Interrupted),
        (SIGTERM, ShutdownReason::Terminated),
        (SIGHUP, ShutdownReason::HangUp),
    ] {
        flag::register_conditional_shutdown(
            signal,
            ExitCode::Signal.as_i32(),
            Arc::clone(&FLAGS.requested),
        )?;
        flag::register_usize(signal, Arc::clone(&FLAGS.reason), reason as usize)?;
        flag::register(signal, Arc::clone(&FLAGS.requested))?;
    }
    Ok(())
}

/// Asks the running loops to stop.
pub fn request_shutdown(reason: ShutdownReason) {
    FLAGS.reason.store(reason as usize, Ordering::SeqCst);
    FLAGS.requested.store(true, Ordering::SeqCst);
}

/// Whether a shutdown has been requested.
#[must_use]
pub fn is_shutdown_requested() -> bool {
    FLAGS.requested.load(Ordering::Relaxed)
}

/// Why the shutdown was requested, if it was.
#[must_use]
pub fn shutdown_reason() -> Option<ShutdownReason> {
    if !is_shutdown_requested() {
        return None;
    }
    ShutdownReason::from_code(FLAGS.reason.load(Ordering::SeqCst))
}

/// Clears the flags.
#[doc(hidden)]
pub fn reset_for_testing() {
    FLAGS.requested.store(false, Ordering::SeqCst);
    FLAGS.reason.store(0, Ordering::SeqCst);
}
