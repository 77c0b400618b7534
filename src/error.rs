//! Error types.
//!
//! Two layers:
//!
//! - [`Error`] is what the proxy hands back to *its* caller: failing to bind
//!   the listening port or to open the access log. Those end the process.
//! - [`Failure`] is what a single connection can run into. It never leaves
//!   the worker that produced it. The worker traces it, closes its sockets
//!   and returns; the listener keeps accepting.

use std::fmt;

use crate::connector::ConnectError;

/// Setup failure: the listening socket could not be bound or the access
/// log could not be opened.
#[derive(Debug)]
pub struct Error(std::io::Error);

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ferry setup: {}", self.0)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self(e)
    }
}


/// Why a connection was abandoned.
///
/// None of these produce a response or an access log entry. The client just
/// sees its connection close.
#[derive(Debug, thiserror::Error)]
pub enum Failure {
    /// The header block never completed (EOF, a read error, an oversized
    /// request), or its first line is not `GET <uri> HTTP/1.x`.
    #[error("bad request: {0}")]
    BadRequest(&'static str),

    /// The URI token is not an absolute `http://host[:port][/path]`.
    #[error("bad uri: {0}")]
    BadUri(&'static str),

    #[error("cannot reach upstream: {0}")]
    Upstream(#[from] ConnectError),
}
