//! Per-connection worker.
//!
//! ```text
//! ACCEPTED → READING → (BAD_REQUEST | PARSED) → (BAD_URI | RESOLVING)
//!          → (CONNECT_FAILED | FORWARDING) → DONE
//! ```
//!
//! Each arrow is one `?` in [`process`]. The context owns both sockets and
//! the request buffer, so whichever way `process` returns they are closed
//! and freed before the worker ends. Only `FORWARDING → DONE` writes to the
//! access log, and it does so before the client socket closes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::BufReader;
use tokio::net::TcpStream;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::access_log::AccessLog;
use crate::config::Config;
use crate::connector;
use crate::error::Failure;
use crate::relay;
use crate::request;
use crate::resolver::Resolver;
use crate::uri::{RequestLine, Target};

/// One accepted client connection.
#[derive(Debug)]
pub struct ConnectionContext {
    /// Position in accept order.
    pub seq: u64,
    pub stream: TcpStream,
    pub peer: SocketAddr,
}

/// State every worker shares. Owned by the server and handed to each
/// worker by `Arc`.
#[derive(Debug)]
pub struct Proxy {
    pub(crate) config: Config,
    pub(crate) resolver: Arc<Resolver>,
    pub(crate) log: AccessLog,
    worker_ids: AtomicU64,
}

impl Proxy {
    pub fn new(config: Config, resolver: Resolver, log: AccessLog) -> Self {
        Self {
            config,
            resolver: Arc::new(resolver),
            log,
            worker_ids: AtomicU64::new(0),
        }
    }

    /// Diagnostic id for the next worker.
    fn next_worker_id(&self) -> u64 {
        self.worker_ids.fetch_add(1, Ordering::Relaxed)
    }
}

/// Handles one connection end to end. Never fails: every problem is traced
/// and the connection dropped.
pub async fn handle(ctx: ConnectionContext, proxy: Arc<Proxy>) {
    let id = proxy.next_worker_id();
    let span = info_span!("worker", id, seq = ctx.seq, peer = %ctx.peer);

    async move {
        debug!("accepted connection");
        match process(ctx, &proxy).await {
            Ok(bytes) => info!(bytes, "request forwarded"),
            Err(failure) => info!("connection abandoned: {failure}"),
        }
    }
    .instrument(span)
    .await
}

async fn process(mut ctx: ConnectionContext, proxy: &Proxy) -> Result<u64, Failure> {
    let (reader, mut client) = ctx.stream.split();
    let mut reader = BufReader::new(reader);

    let raw = request::read_request(&mut reader, proxy.config.max_request_bytes).await?;
    debug!(
        bytes = raw.len(),
        "received request:\n{}*** end of request ***",
        String::from_utf8_lossy(raw.as_bytes())
    );

    let (line, headers_at) = RequestLine::parse(raw.as_bytes())?;
    let target: Target = line.uri.parse()?;
    debug!(%target, version = ?line.version, "parsed request line");

    let mut upstream = connector::connect(&proxy.resolver, &target).await?;
    debug!(%target, "connected to upstream");

    let bytes = relay::relay(
        &mut upstream,
        &mut client,
        &target,
        &raw.as_bytes()[headers_at..],
        proxy.config.relay_chunk_size,
    )
    .await;

    if let Err(e) = proxy.log.append(ctx.peer.ip(), &line.uri, bytes) {
        warn!("access log write failed: {e}");
    }

    Ok(bytes)
}
