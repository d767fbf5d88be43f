use crate::error::ProtocolError;

use super::LEGACY_DAEMON_PREFIX;

/// A parsed `@RSYNCD: <major>[.<minor>]` greeting.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DaemonGreeting {
    /// Advertised protocol.
    pub protocol: u32,
    /// Optional sub-protocol after the dot.
    pub subprotocol: Option<u32>,
}

/// Parses a greeting line, with or without its trailing newline.
///
/// Anything after the version (such as a digest list) is ignored.
pub fn parse_greeting(line: &str) -> Result<DaemonGreeting, ProtocolError> {
    let malformed = || ProtocolError::malformed("daemon greeting", line.trim_end().to_owned());
    let rest = line
        .strip_prefix(LEGACY_DAEMON_PREFIX)
        .ok_or_else(malformed)?
        .trim();
    let version = rest.split_ascii_whitespace().next().ok_or_else(malformed)?;
    let (major, minor) = match version.split_once('.') {
        Some((major, minor)) => (major, Some(minor)),
        None => (version, None),
    };
    let protocol = major.parse().map_err(|_| malformed())?;
    let subprotocol = match minor {
        Some(minor) => Some(minor.parse().map_err(|_| malformed())?),
        None => None,
    };
    Ok(DaemonGreeting {
        protocol,
        subprotocol,
    })
}

/// Formats the greeting a client sends, newline included.
#[must_use]
pub fn format_greeting(protocol: u32) -> String {
    format!("{LEGACY_DAEMON_PREFIX} {protocol}.0\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_versions() {
        assert_eq!(
            parse_greeting("@RSYNCD: 31.0 sha512 md5 md4\n").unwrap(),
            DaemonGreeting {
                protocol: 31,
                subprotocol: Some(0)
            }
        );
        assert_eq!(
            parse_greeting("@RSYNCD: 29").unwrap(),
            DaemonGreeting {
                protocol: 29,
                subprotocol: None
            }
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_greeting("HELLO 29").is_err());
        assert!(parse_greeting("@RSYNCD: ").is_err());
        assert!(parse_greeting("@RSYNCD: x.1").is_err());
    }

    #[test]
    fn formats_client_greeting() {
        assert_eq!(format_greeting(29), "@RSYNCD: 29.0\n");
        assert_eq!(parse_greeting(&format_greeting(29)).unwrap().protocol, 29);
    }
}
