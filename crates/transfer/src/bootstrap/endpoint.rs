//! crates/transfer/src/bootstrap/endpoint.rs
//!
//! Classifies a command-line operand as local, remote-shell or daemon.

use std::fmt;
use std::path::PathBuf;

/// Port a daemon listens on unless told otherwise.
pub const DEFAULT_DAEMON_PORT: u16 = 873;

/// Where one side of a transfer lives.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Endpoint {
    /// A path on this host.
    Local(PathBuf),
    /// `[user@]host:path`, reached through a remote shell.
    Remote {
        /// Login name, if given.
        user: Option<String>,
        /// Host name or address, brackets removed.
        host: String,
        /// Path on the remote host.
        path: String,
    },
    /// `[user@]host::module/path` or `rsync://[user@]host[:port]/module/path`.
    Daemon {
        /// Name for authentication, if given.
        user: Option<String>,
        /// Host name or address, brackets removed.
        host: String,
        /// TCP port.
        port: u16,
        /// Module name.
        module: String,
        /// Path inside the module, possibly empty.
        path: String,
    },
}

/// An operand that names a host but nothing usable.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EndpointError {
    operand: String,
    reason: &'static str,
}

impl fmt::Display for EndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operand, self.reason)
    }
}

impl std::error::Error for EndpointError {}

impl Endpoint {
    /// Parses `operand`.
    ///
    /// A colon only marks a remote operand when it comes before the first
    /// slash, so `./a:b` and `/tmp/x:y` stay local.
    pub fn parse(operand: &str) -> Result<Self, EndpointError> {
        let fail = |reason| EndpointError {
            operand: operand.to_owned(),
            reason,
        };
        if let Some(rest) = operand.strip_prefix("rsync://") {
            let (authority, tail) = rest.split_once('/').unwrap_or((rest, ""));
            let (user, hostport) = split_user(authority);
            let (host, port) = split_port(hostport).ok_or_else(|| fail("invalid port"))?;
            if host.is_empty() {
                return Err(fail("missing host"));
            }
            let (module, path) = tail.split_once('/').unwrap_or((tail, ""));
            return Ok(Self::Daemon {
                user,
                host: strip_brackets(host).to_owned(),
                port: port.unwrap_or(DEFAULT_DAEMON_PORT),
                module: module.to_owned(),
                path: path.to_owned(),
            });
        }

        let Some(colon) = host_colon(operand) else {
            return Ok(Self::Local(PathBuf::from(operand)));
        };
        let (user, host) = split_user(&operand[..colon]);
        if host.is_empty() {
            return Err(fail("missing host"));
        }
        let host = strip_brackets(host).to_owned();
        let rest = &operand[colon + 1..];
        if let Some(module_path) = rest.strip_prefix(':') {
            let (module, path) = module_path.split_once('/').unwrap_or((module_path, ""));
            return Ok(Self::Daemon {
                user,
                host,
                port: DEFAULT_DAEMON_PORT,
                module: module.to_owned(),
                path: path.to_owned(),
            });
        }
        Ok(Self::Remote {
            user,
            host,
            path: rest.to_owned(),
        })
    }

    /// Whether the operand names this host.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// Host the operand names, if any.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        match self {
            Self::Local(_) => None,
            Self::Remote { host, .. } | Self::Daemon { host, .. } => Some(host),
        }
    }

    /// Path as the far side should see it.
    #[must_use]
    pub fn remote_path(&self) -> String {
        match self {
            Self::Local(path) => path.to_string_lossy().into_owned(),
            Self::Remote { path, .. } => path.clone(),
            Self::Daemon { module, path, .. } => {
                if path.is_empty() {
                    format!("{module}/")
                } else {
                    format!("{module}/{path}")
                }
            }
        }
    }

    /// Whether `other` reaches the same host the same way.
    #[must_use]
    pub fn same_host(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Remote { user: a, host: h, .. }, Self::Remote { user: b, host: k, .. }) => {
                a == b && h == k
            }
            (
                Self::Daemon {
                    host: h,
                    port: p,
                    module: m,
                    ..
                },
                Self::Daemon {
                    host: k,
                    port: q,
                    module: n,
                    ..
                },
            ) => h == k && p == q && m == n,
            _ => false,
        }
    }
}

/// Index of the colon that ends a host part, if the operand has one.
fn host_colon(operand: &str) -> Option<usize> {
    let search_from = if operand.starts_with('[') || operand.contains("@[") {
        operand.find(']')?
    } else {
        0
    };
    let colon = search_from + operand[search_from..].find(':')?;
    let slash = operand.find('/');
    if colon == 0 || slash.is_some_and(|s| s < colon) {
        return None;
    }
    Some(colon)
}

fn split_user(text: &str) -> (Option<String>, &str) {
    match text.rsplit_once('@') {
        Some((user, host)) if !user.is_empty() => (Some(user.to_owned()), host),
        Some((_, host)) => (None, host),
        None => (None, text),
    }
}

fn split_port(text: &str) -> Option<(&str, Option<u16>)> {
    let port_colon = if text.starts_with('[') {
        text.find(']').and_then(|end| text[end..].find(':').map(|c| end + c))
    } else {
        text.rfind(':')
    };
    match port_colon {
        Some(colon) => {
            let port = text[colon + 1..].parse().ok()?;
            Some((&text[..colon], Some(port)))
        }
        None => Some((text, None)),
    }
}

fn strip_brackets(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_are_local() {
        assert_eq!(Endpoint::parse("src/").unwrap(), Endpoint::Local("src/".into()));
        assert!(Endpoint::parse("./a:b").unwrap().is_local());
        assert!(Endpoint::parse("/tmp/x:y").unwrap().is_local());
    }

    #[test]
    fn remote_shell_operands() {
        assert_eq!(
            Endpoint::parse("alice@example.com:/srv/data").unwrap(),
            Endpoint::Remote {
                user: Some("alice".into()),
                host: "example.com".into(),
                path: "/srv/data".into(),
            }
        );
        let ipv6 = Endpoint::parse("[::1]:dir").unwrap();
        assert_eq!(ipv6.host(), Some("::1"));
        assert_eq!(ipv6.remote_path(), "dir");
    }

    #[test]
    fn daemon_operands_in_both_spellings() {
        let short = Endpoint::parse("host::mod/sub/file").unwrap();
        let url = Endpoint::parse("rsync://host/mod/sub/file").unwrap();
        assert_eq!(short, url);
        assert_eq!(short.remote_path(), "mod/sub/file");

        let Endpoint::Daemon {
            port, user, module, ..
        } = Endpoint::parse("rsync://bob@host:8873/mod").unwrap()
        else {
            panic!("expected a daemon endpoint");
        };
        assert_eq!((port, user.as_deref(), module.as_str()), (8873, Some("bob"), "mod"));
    }

    #[test]
    fn missing_hosts_are_rejected() {
        assert!(Endpoint::parse("@:path").is_err());
        assert!(Endpoint::parse("rsync://host:notaport/mod").is_err());
    }
}
