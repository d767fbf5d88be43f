//! crates/protocol/src/handshake.rs
//!
//! Binary protocol-version exchange used over pipes and remote shells.
//!
//! Both sides write their version as a 32-bit integer and read the peer's.
//! The server then sends the checksum seed. The negotiated version is the
//! smaller of the two; peers older than [`PROTOCOL_MIN`](crate::PROTOCOL_MIN)
//! are refused.

use std::io::{Read, Write};

use logging::{debug_log, trace_proto};

use crate::error::ProtocolError;
use crate::varint::{read_int, write_int};
use crate::version::ProtocolVersion;

/// Result of the opening exchange.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Handshake {
    /// Negotiated protocol.
    pub protocol: ProtocolVersion,
    /// Version the peer advertised.
    pub remote: u32,
    /// Checksum seed chosen by the server.
    pub seed: i32,
}

/// Exchanges versions without a seed; returns `(negotiated, remote)`.
pub fn exchange_versions<R, W>(
    reader: &mut R,
    writer: &mut W,
    local: u32,
) -> Result<(ProtocolVersion, u32), ProtocolError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    write_int(writer, i32::try_from(local).unwrap_or(i32::MAX))?;
    writer.flush()?;
    let remote = read_int(reader)?;
    let negotiated = ProtocolVersion::negotiate(local, remote)?;
    debug_log!(Proto, 1, "protocol: local {local}, remote {remote}, using {negotiated}");
    trace_proto!(local, remote, negotiated = negotiated.as_u32(), "version exchange");
    Ok((negotiated, u32::try_from(remote).unwrap_or(0)))
}

/// Server side: exchange versions, then send `seed`.
pub fn server_handshake<R, W>(
    reader: &mut R,
    writer: &mut W,
    local: u32,
    seed: i32,
) -> Result<Handshake, ProtocolError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let (protocol, remote) = exchange_versions(reader, writer, local)?;
    write_int(writer, seed)?;
    writer.flush()?;
    Ok(Handshake {
        protocol,
        remote,
        seed,
    })
}

/// Client side: exchange versions, then read the server's seed.
pub fn client_handshake<R, W>(
    reader: &mut R,
    writer: &mut W,
    local: u32,
) -> Result<Handshake, ProtocolError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let (protocol, remote) = exchange_versions(reader, writer, local)?;
    let seed = read_int(reader)?;
    Ok(Handshake {
        protocol,
        remote,
        seed,
    })
}
