//! Listener: accepts connections and hands each to its own worker.
//!
//! Workers are spawned and forgotten. The accept loop never waits on one,
//! and nothing a worker runs into reaches the loop. A failed `accept` is
//! logged and the loop carries on.
//!
//! With [`Config::max_connections`] set, a permit is taken before each
//! accept and released when the worker finishes, so at most that many
//! workers are live. Without it there is no limit.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{error, info};

use crate::access_log::AccessLog;
use crate::config::Config;
use crate::connection::{self, ConnectionContext, Proxy};
use crate::error::Error;
use crate::resolver::Resolver;

/// The proxy server.
pub struct Server {
    listener: TcpListener,
    proxy: Arc<Proxy>,
    limit: Option<Arc<Semaphore>>,
}

impl Server {
    /// Binds the listening socket and opens the access log, resolving
    /// upstream hosts through the operating system.
    pub async fn bind(config: Config) -> Result<Self, Error> {
        let log = AccessLog::open(&config.log_path)?;
        Self::bind_with(config, Resolver::system(), log).await
    }

    /// Like [`bind`](Server::bind) with a caller-supplied resolver and log.
    pub async fn bind_with(config: Config, resolver: Resolver, log: AccessLog) -> Result<Self, Error> {
        let listener = TcpListener::bind(config.bind_addr()).await?;
        let limit = config.max_connections.map(|n| Arc::new(Semaphore::new(n.max(1))));

        info!(
            addr = %listener.local_addr()?,
            log = %config.log_path.display(),
            max_connections = ?config.max_connections,
            "ferry listening"
        );

        Ok(Self {
            listener,
            proxy: Arc::new(Proxy::new(config, resolver, log)),
            limit,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves until SIGTERM or Ctrl-C.
    pub async fn serve(self) -> Result<(), Error> {
        self.serve_with_shutdown(shutdown_signal()).await
    }

    /// Serves until `signal` resolves. Workers still running at that point
    /// are not waited for.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(signal);
        let mut seq = 0u64;

        loop {
            tokio::select! {
                biased;

                () = &mut signal => {
                    info!("shutdown signal received, no longer accepting");
                    break;
                }

                res = accept(&self.listener, self.limit.as_ref()) => {
                    let (stream, peer, permit) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let ctx = ConnectionContext { seq, stream, peer };
                    seq += 1;

                    let proxy = Arc::clone(&self.proxy);
                    tokio::spawn(async move {
                        connection::handle(ctx, proxy).await;
                        drop(permit);
                    });
                }
            }
        }

        info!("ferry stopped");
        Ok(())
    }
}

/// Waits for a free worker slot, if there is a limit, then for a connection.
async fn accept(
    listener: &TcpListener,
    limit: Option<&Arc<Semaphore>>,
) -> std::io::Result<(TcpStream, SocketAddr, Option<OwnedSemaphorePermit>)> {
    let permit = match limit {
        Some(limit) => Some(
            Arc::clone(limit)
                .acquire_owned()
                .await
                .map_err(std::io::Error::other)?,
        ),
        None => None,
    };

    let (stream, peer) = listener.accept().await?;
    Ok((stream, peer, permit))
}

/// Resolves on the first SIGTERM or SIGINT the process receives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
