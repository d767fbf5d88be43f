//! The `@RSYNCD:` text preamble spoken by daemons before the binary
//! protocol starts.

mod auth;
mod greeting;
mod lines;
mod session;

pub use auth::auth_response;
pub use greeting::{DaemonGreeting, format_greeting, parse_greeting};
pub use lines::{LegacyDaemonMessage, parse_daemon_line, read_line};
pub use session::{DaemonRequest, daemon_client_exchange};

/// Prefix shared by every daemon control line.
pub const LEGACY_DAEMON_PREFIX: &str = "@RSYNCD:";

/// Default TCP port of an rsync daemon.
pub const DEFAULT_DAEMON_PORT: u16 = 873;
