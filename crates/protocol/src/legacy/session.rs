use std::io::{Read, Write};

use logging::{debug_log, info_log};

use crate::error::ProtocolError;
use crate::version::ProtocolVersion;

use super::auth::auth_response;
use super::greeting::{format_greeting, parse_greeting};
use super::lines::{LegacyDaemonMessage, parse_daemon_line, read_line};

/// What a client asks of a daemon.
#[derive(Clone, Copy, Debug)]
pub struct DaemonRequest<'a> {
    /// Module name.
    pub module: &'a str,
    /// User for challenge/response authentication.
    pub user: &'a str,
    /// Password, if one is available.
    pub password: Option<&'a [u8]>,
    /// Server argument vector: options, `.`, then paths.
    pub args: &'a [String],
    /// Protocol we advertise.
    pub protocol: u32,
}

/// Runs the client side of the daemon text preamble.
///
/// On success the daemon has answered `@RSYNCD: OK`, the argument list has
/// been sent, and the stream is positioned at the start of the binary
/// protocol (the daemon's checksum seed).
pub fn daemon_client_exchange<S>(
    stream: &mut S,
    request: &DaemonRequest<'_>,
) -> Result<ProtocolVersion, ProtocolError>
where
    S: Read + Write + ?Sized,
{
    stream.write_all(format_greeting(request.protocol).as_bytes())?;
    stream.flush()?;
    let greeting = parse_greeting(&read_line(stream)?)?;
    let negotiated = ProtocolVersion::negotiate(
        request.protocol,
        i32::try_from(greeting.protocol).unwrap_or(i32::MAX),
    )?;
    debug_log!(Connect, 1, "daemon speaks protocol {}, using {negotiated}", greeting.protocol);

    stream.write_all(format!("{}\n", request.module).as_bytes())?;
    stream.flush()?;

    loop {
        let line = read_line(stream)?;
        match parse_daemon_line(&line) {
            LegacyDaemonMessage::Ok => break,
            LegacyDaemonMessage::Exit => return Err(ProtocolError::DaemonExit),
            LegacyDaemonMessage::Error(text) => return Err(ProtocolError::Daemon(text.to_owned())),
            LegacyDaemonMessage::AuthRequired { challenge } => {
                let Some(password) = request.password else {
                    return Err(ProtocolError::Daemon(format!(
                        "module {} requires a password",
                        request.module
                    )));
                };
                let response = auth_response(request.user, password, challenge);
                stream.write_all(response.as_bytes())?;
                stream.write_all(b"\n")?;
                stream.flush()?;
            }
            LegacyDaemonMessage::Text(text) => info_log!(Misc, 0, "{text}"),
        }
    }

    for arg in request.args {
        stream.write_all(arg.as_bytes())?;
        stream.write_all(b"\n")?;
    }
    stream.write_all(b"\n")?;
    stream.flush()?;
    Ok(negotiated)
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader};
    use std::os::unix::net::UnixStream;
    use std::thread;

    use super::*;

    fn fake_daemon(
        stream: UnixStream,
        auth: bool,
        verdict: &'static str,
    ) -> thread::JoinHandle<Vec<String>> {
        thread::spawn(move || {
            let mut writer = stream.try_clone().unwrap();
            let mut reader = BufReader::new(stream);
            let mut seen = Vec::new();
            writer.write_all(b"@RSYNCD: 31.0 md4\n").unwrap();
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            seen.push(line.trim_end().to_owned());
            line.clear();
            reader.read_line(&mut line).unwrap();
            seen.push(line.trim_end().to_owned());
            writer.write_all(b"motd line\n").unwrap();
            if auth {
                writer.write_all(b"@RSYNCD: AUTHREQD abcdef\n").unwrap();
                line.clear();
                reader.read_line(&mut line).unwrap();
                seen.push(line.trim_end().to_owned());
            }
            writer.write_all(verdict.as_bytes()).unwrap();
            loop {
                line.clear();
                if reader.read_line(&mut line).unwrap() == 0 || line == "\n" {
                    break;
                }
                seen.push(line.trim_end().to_owned());
            }
            seen
        })
    }

    #[test]
    fn full_exchange_with_auth() {
        let (client, server) = UnixStream::pair().unwrap();
        let daemon = fake_daemon(server, true, "@RSYNCD: OK\n");
        let args = vec![
            "--server".to_owned(),
            "--sender".to_owned(),
            ".".to_owned(),
            "mod/".to_owned(),
        ];
        let mut stream = client;
        let negotiated = daemon_client_exchange(
            &mut stream,
            &DaemonRequest {
                module: "mod",
                user: "bob",
                password: Some(b"pw"),
                args: &args,
                protocol: 29,
            },
        )
        .unwrap();
        drop(stream);
        let seen = daemon.join().unwrap();

        assert_eq!(negotiated.as_u32(), 29);
        assert_eq!(seen[0], "@RSYNCD: 29.0");
        assert_eq!(seen[1], "mod");
        assert_eq!(seen[2], auth_response("bob", b"pw", "abcdef"));
        assert_eq!(&seen[3..], &args[..]);
    }

    #[test]
    fn daemon_error_surfaces() {
        let (client, server) = UnixStream::pair().unwrap();
        let daemon = fake_daemon(server, false, "@ERROR: Unknown module 'nope'\n");
        let mut stream = client;
        let err = daemon_client_exchange(
            &mut stream,
            &DaemonRequest {
                module: "nope",
                user: "bob",
                password: None,
                args: &[],
                protocol: 29,
            },
        )
        .unwrap_err();
        drop(stream);
        daemon.join().unwrap();
        assert!(matches!(err, ProtocolError::Daemon(text) if text.contains("nope")));
    }

    #[test]
    fn missing_password_is_refused() {
        let (client, server) = UnixStream::pair().unwrap();
        let daemon = fake_daemon(server, true, "@RSYNCD: OK\n");
        let mut stream = client;
        let err = daemon_client_exchange(
            &mut stream,
            &DaemonRequest {
                module: "secret",
                user: "bob",
                password: None,
                args: &[],
                protocol: 29,
            },
        )
        .unwrap_err();
        drop(stream);
        let _ = daemon.join();
        assert!(matches!(err, ProtocolError::Daemon(_)));
    }
}
