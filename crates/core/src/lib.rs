#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Pieces every layer of the transfer engine agrees on: the process exit
//! codes a run ends with and the interrupt flags the event loops poll.
//!
//! ```
//! use rsync_core::{ExitCode, ShutdownReason, request_shutdown, shutdown_reason};
//!
//! assert_eq!(ExitCode::DeleteLimit.as_i32(), 25);
//! request_shutdown(ShutdownReason::UserRequested);
//! assert_eq!(shutdown_reason().map(ShutdownReason::exit_code), Some(ExitCode::Signal));
//! ```

mod exit_code;
mod signal;

pub use exit_code::{ExitCode, HasExitCode};
pub use signal::{
    ShutdownReason, install_signal_handlers, is_shutdown_requested, request_shutdown,
    reset_for_testing, shutdown_reason,
};
