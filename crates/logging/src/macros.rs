//! crates/logging/src/macros.rs
//! Level-gated logging macros.
//!
//! The message is only formatted when the thread's verbosity admits it.

/// Emits an info diagnostic when `flag` is at or above `level`.
///
/// ```
/// use logging::info_log;
///
/// info_log!(Name, 1, "{}", "dir/file.txt");
/// ```
#[macro_export]
macro_rules! info_log {
    ($flag:ident, $level:expr, $($arg:tt)+) => {
        if $crate::info_gte($crate::InfoFlag::$flag, $level) {
            $crate::emit_info($crate::InfoFlag::$flag, $level, format!($($arg)+));
        }
    };
}

/// Emits a debug diagnostic when `flag` is at or above `level`.
#[macro_export]
macro_rules! debug_log {
    ($flag:ident, $level:expr, $($arg:tt)+) => {
        if $crate::debug_gte($crate::DebugFlag::$flag, $level) {
            $crate::emit_debug($crate::DebugFlag::$flag, $level, format!($($arg)+));
        }
    };
}

/// Emits a warning regardless of verbosity.
#[macro_export]
macro_rules! warn_log {
    ($($arg:tt)+) => {
        $crate::emit($crate::DiagnosticEvent::Warning(format!($($arg)+)))
    };
}

/// Emits an error regardless of verbosity.
#[macro_export]
macro_rules! error_log {
    ($($arg:tt)+) => {
        $crate::emit($crate::DiagnosticEvent::Error(format!($($arg)+)))
    };
}
