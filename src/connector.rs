//! Upstream connector: one attempt at a TCP connection to the origin.

use std::net::SocketAddrV4;
use std::sync::Arc;

use tokio::net::{TcpSocket, TcpStream};
use tracing::debug;

use crate::resolver::{ResolveError, Resolver};
use crate::uri::Target;

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("socket creation failed: {0}")]
    Socket(#[source] std::io::Error),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: SocketAddrV4,
        #[source]
        source: std::io::Error,
    },
}

/// Opens a connection to `target`. No retries.
pub async fn connect(resolver: &Arc<Resolver>, target: &Target) -> Result<TcpStream, ConnectError> {
    let socket = TcpSocket::new_v4().map_err(ConnectError::Socket)?;

    let entry = resolver.resolve_async(&target.host).await?;
    let addr = SocketAddrV4::new(entry.addr(), target.port);
    debug!(host = %target.host, %addr, "resolved upstream");

    socket
        .connect(addr.into())
        .await
        .map_err(|source| ConnectError::Connect { addr, source })
}
