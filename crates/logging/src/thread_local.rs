//! crates/logging/src/thread_local.rs
//! Thread-local storage for verbosity configuration and event delivery.
//!
//! Each role runs its event loop on one thread, so the verbosity table and
//! the active sink are per thread. Without an installed sink, events are
//! buffered and can be drained by the caller.

use super::config::VerbosityConfig;
use super::levels::{DebugFlag, InfoFlag};
use std::cell::RefCell;
use std::fmt;

/// Callback receiving every emitted diagnostic.
pub type EventSink = Box<dyn FnMut(&DiagnosticEvent)>;

thread_local! {
    static VERBOSITY: RefCell<VerbosityConfig> = RefCell::new(VerbosityConfig::default());
    static SINK: RefCell<Option<EventSink>> = const { RefCell::new(None) };
    static EVENTS: RefCell<Vec<DiagnosticEvent>> = const { RefCell::new(Vec::new()) };
}

/// Diagnostic event produced by the logging macros.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiagnosticEvent {
    /// Info-level diagnostic.
    Info {
        /// Category.
        flag: InfoFlag,
        /// Level the message was emitted at.
        level: u8,
        /// Rendered text.
        message: String,
    },
    /// Debug-level diagnostic.
    Debug {
        /// Category.
        flag: DebugFlag,
        /// Level the message was emitted at.
        level: u8,
        /// Rendered text.
        message: String,
    },
    /// Warning; never filtered by verbosity.
    Warning(String),
    /// Error; never filtered by verbosity.
    Error(String),
}

impl DiagnosticEvent {
    /// Returns the rendered message text.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Info { message, .. } | Self::Debug { message, .. } => message,
            Self::Warning(message) | Self::Error(message) => message,
        }
    }
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info { message, .. } => f.write_str(message),
            Self::Debug { flag, message, .. } => write!(f, "[{}] {message}", flag.name()),
            Self::Warning(message) => write!(f, "warning: {message}"),
            Self::Error(message) => write!(f, "error: {message}"),
        }
    }
}

/// Installs the verbosity configuration for the current thread.
pub fn init(config: VerbosityConfig) {
    VERBOSITY.with(|v| *v.borrow_mut() = config);
}

/// Returns a copy of the current thread's verbosity configuration.
#[must_use]
pub fn current() -> VerbosityConfig {
    VERBOSITY.with(|v| *v.borrow())
}

/// Checks if the info flag is at or above the specified level.
pub fn info_gte(flag: InfoFlag, level: u8) -> bool {
    VERBOSITY.with(|v| v.borrow().info.get(flag) >= level)
}

/// Checks if the debug flag is at or above the specified level.
pub fn debug_gte(flag: DebugFlag, level: u8) -> bool {
    VERBOSITY.with(|v| v.borrow().debug.get(flag) >= level)
}

/// Routes subsequent events on this thread to `sink`, returning the
/// previously installed sink.
pub fn set_sink(sink: EventSink) -> Option<EventSink> {
    SINK.with(|s| s.borrow_mut().replace(sink))
}

/// Removes the current thread's sink so events are buffered again.
pub fn clear_sink() -> Option<EventSink> {
    SINK.with(|s| s.borrow_mut().take())
}

/// Delivers an event to the sink, or buffers it when none is installed.
pub fn emit(event: DiagnosticEvent) {
    let delivered = SINK.with(|s| match s.try_borrow_mut() {
        Ok(mut guard) => match guard.as_mut() {
            Some(sink) => {
                sink(&event);
                true
            }
            None => false,
        },
        // A sink that logs from inside itself falls back to the buffer.
        Err(_) => false,
    });
    if !delivered {
        EVENTS.with(|e| e.borrow_mut().push(event));
    }
}

/// Emits an info event.
pub fn emit_info(flag: InfoFlag, level: u8, message: String) {
    emit(DiagnosticEvent::Info {
        flag,
        level,
        message,
    });
}

/// Emits a debug event.
pub fn emit_debug(flag: DebugFlag, level: u8, message: String) {
    emit(DiagnosticEvent::Debug {
        flag,
        level,
        message,
    });
}

/// Drains all buffered events.
pub fn drain_events() -> Vec<DiagnosticEvent> {
    EVENTS.with(|e| std::mem::take(&mut *e.borrow_mut()))
}
