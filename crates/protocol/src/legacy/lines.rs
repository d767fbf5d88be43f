use std::io::{self, Read};

use crate::error::ProtocolError;
use crate::varint::read_byte;

use super::LEGACY_DAEMON_PREFIX;

/// Longest control line accepted from a daemon.
pub const MAX_LINE_LEN: usize = 4096;

/// Classified daemon control line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LegacyDaemonMessage<'a> {
    /// `@RSYNCD: OK`: the binary protocol follows.
    Ok,
    /// `@RSYNCD: EXIT`: the daemon is closing the session.
    Exit,
    /// `@RSYNCD: AUTHREQD <challenge>`.
    AuthRequired {
        /// Base64 challenge to hash with the password.
        challenge: &'a str,
    },
    /// `@ERROR...`: fatal error text.
    Error(&'a str),
    /// Anything else, typically the message of the day.
    Text(&'a str),
}

/// Classifies one line (without its newline).
#[must_use]
pub fn parse_daemon_line(line: &str) -> LegacyDaemonMessage<'_> {
    if let Some(rest) = line.strip_prefix("@ERROR") {
        return LegacyDaemonMessage::Error(rest.trim_start_matches(':').trim());
    }
    let Some(rest) = line.strip_prefix(LEGACY_DAEMON_PREFIX) else {
        return LegacyDaemonMessage::Text(line);
    };
    let rest = rest.trim();
    match rest {
        "OK" => LegacyDaemonMessage::Ok,
        "EXIT" => LegacyDaemonMessage::Exit,
        _ => match rest.strip_prefix("AUTHREQD") {
            Some(challenge) => LegacyDaemonMessage::AuthRequired {
                challenge: challenge.trim(),
            },
            None => LegacyDaemonMessage::Text(line),
        },
    }
}

/// Reads one `\n`-terminated line a byte at a time so no binary data after
/// it is consumed. Trailing `\r` is dropped.
pub fn read_line<R: Read + ?Sized>(reader: &mut R) -> io::Result<String> {
    let mut line = Vec::new();
    loop {
        let byte = read_byte(reader)?;
        if byte == b'\n' {
            break;
        }
        if line.len() == MAX_LINE_LEN {
            return Err(ProtocolError::malformed("daemon line", "line too long").into());
        }
        line.push(byte);
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(String::from_utf8_lossy(&line).into_owned())
}
