//! crates/logging/src/tracing_bridge.rs
//! `tracing-subscriber` installation keyed off the rsync verbosity level.

use super::config::VerbosityConfig;
use tracing_subscriber::EnvFilter;

/// Maps a `-v` count onto a default filter for the `rsync::*` targets.
#[must_use]
pub fn default_directive(config: &VerbosityConfig) -> &'static str {
    match config.verbose {
        0 | 1 => "warn",
        2 => "rsync=info",
        3 => "rsync=debug",
        _ => "rsync=trace",
    }
}

/// Installs a global `fmt` subscriber writing to stderr.
///
/// `RUST_LOG` overrides the level-derived filter. Returns `false` if a
/// global subscriber was already installed.
pub fn init_tracing(config: &VerbosityConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .is_ok()
}
