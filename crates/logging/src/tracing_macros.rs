//! crates/logging/src/tracing_macros.rs
//! Target-scoped tracing macros for the engine's subsystems.
//!
//! With the `tracing` feature these expand to `tracing::debug!` events under
//! `rsync::*` targets; without it they expand to nothing so call sites do
//! not need their own `cfg` guards.

/// Emits a sender-side trace event.
///
/// ```ignore
/// trace_send!(ndx, len, "sending literal run");
/// ```
#[cfg(feature = "tracing")]
#[macro_export]
macro_rules! trace_send {
    ($($arg:tt)*) => {
        $crate::__tracing::debug!(target: "rsync::sender", $($arg)*);
    };
}

/// Emits a downloader-side trace event.
#[cfg(feature = "tracing")]
#[macro_export]
macro_rules! trace_recv {
    ($($arg:tt)*) => {
        $crate::__tracing::debug!(target: "rsync::receiver", $($arg)*);
    };
}

/// Emits a protocol negotiation trace event.
#[cfg(feature = "tracing")]
#[macro_export]
macro_rules! trace_proto {
    ($($arg:tt)*) => {
        $crate::__tracing::debug!(target: "rsync::protocol", $($arg)*);
    };
}

/// Emits a framed-I/O trace event.
#[cfg(feature = "tracing")]
#[macro_export]
macro_rules! trace_io {
    ($($arg:tt)*) => {
        $crate::__tracing::trace!(target: "rsync::io", $($arg)*);
    };
}

/// Emits a block-matching trace event.
#[cfg(feature = "tracing")]
#[macro_export]
macro_rules! trace_delta {
    ($($arg:tt)*) => {
        $crate::__tracing::trace!(target: "rsync::delta", $($arg)*);
    };
}

/// Emits a file-list trace event.
#[cfg(feature = "tracing")]
#[macro_export]
macro_rules! trace_flist {
    ($($arg:tt)*) => {
        $crate::__tracing::debug!(target: "rsync::flist", $($arg)*);
    };
}

/// Emits a deletion trace event.
#[cfg(feature = "tracing")]
#[macro_export]
macro_rules! trace_del {
    ($($arg:tt)*) => {
        $crate::__tracing::info!(target: "rsync::delete", $($arg)*);
    };
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
#[doc(hidden)]
macro_rules! trace_send {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
#[doc(hidden)]
macro_rules! trace_recv {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
#[doc(hidden)]
macro_rules! trace_proto {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
#[doc(hidden)]
macro_rules! trace_io {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
#[doc(hidden)]
macro_rules! trace_delta {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
#[doc(hidden)]
macro_rules! trace_flist {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
#[doc(hidden)]
macro_rules! trace_del {
    ($($arg:tt)*) => {};
}
