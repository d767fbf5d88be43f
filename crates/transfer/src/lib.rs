#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! The delta-transfer engine: sessions, the two roles, and the plumbing
//! that connects a client to its peer.
//!
//! # Roles
//!
//! A [`Session`] is one end of a connection after the version handshake.
//! Its [`Role`] decides what runs on it:
//!
//! - the **sender** walks its sources, sends the file list, then answers
//!   each request with a token stream computed against the receiver's
//!   block sums;
//! - the **receiver** reads the list, then runs an uploader (requests and
//!   block sums) and a downloader (token application and verification)
//!   side by side from one poll loop, with a redo phase for files whose
//!   digest did not match.
//!
//! # Bootstrap
//!
//! [`run_client`] classifies operands with [`Endpoint`] and connects:
//! local copies run the sender on a second thread over a socket pair,
//! remote-shell operands spawn `--server` on the far host, and daemon
//! operands speak the `@RSYNCD:` preamble over TCP first. [`serve`] is the
//! `--server` side on stdin and stdout.
//!
//! # Errors
//!
//! Per-file failures are logged and counted; a run that had any ends with
//! [`TransferError::Partial`]. Everything else is fatal and carries its
//! exit status through [`TransferError::exit_code`].

mod bootstrap;
mod error;
mod options;
mod receiver;
mod sender;
mod session;

pub use bootstrap::{DEFAULT_DAEMON_PORT, Endpoint, EndpointError, run_client, serve, server_args};
pub use error::{TransferError, TransferResult};
pub use options::{BasisDir, BasisKind, Options};
pub use session::{Connection, Role, Session};
