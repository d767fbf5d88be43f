#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Verbosity-gated diagnostics for the transfer engine.
//!
//! Diagnostics are grouped into rsync's `--info` and `--debug` categories.
//! Each thread carries its own [`VerbosityConfig`]; the [`info_log!`] and
//! [`debug_log!`] macros consult it before formatting anything. Emitted
//! [`DiagnosticEvent`]s go to the thread's sink (see [`set_sink`]) or are
//! buffered until [`drain_events`] is called.
//!
//! With the `tracing` feature, the `trace_*!` macros emit `tracing` events
//! under `rsync::*` targets and [`init_tracing`] installs a
//! `tracing-subscriber` formatter.

mod config;
mod levels;
mod macros;
mod thread_local;
#[cfg(feature = "tracing")]
mod tracing_bridge;
mod tracing_macros;

pub use config::VerbosityConfig;
pub use levels::{DebugFlag, DebugLevels, InfoFlag, InfoLevels};
pub use thread_local::{
    DiagnosticEvent, EventSink, clear_sink, current, debug_gte, drain_events, emit, emit_debug,
    emit_info, info_gte, init, set_sink,
};
#[cfg(feature = "tracing")]
pub use tracing_bridge::{default_directive, init_tracing};

#[cfg(feature = "tracing")]
#[doc(hidden)]
pub use tracing as __tracing;
