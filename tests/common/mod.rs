//! Shared utilities for the end-to-end tests.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use ferry::{AccessLog, Config, HostsTable, Resolver, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// A running proxy plus the log file it writes to.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub log_path: PathBuf,
}

impl TestProxy {
    pub fn log(&self) -> String {
        std::fs::read_to_string(&self.log_path).unwrap_or_default()
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.log_path);
    }
}

fn unique_log_path() -> PathBuf {
    static NEXT: AtomicU32 = AtomicU32::new(0);
    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("ferry-test-{}-{n}.log", std::process::id()))
}

/// Starts a proxy on an ephemeral loopback port. `hosts` maps names used in
/// test URIs to 127.0.0.1.
pub async fn start_proxy(hosts: &[&str]) -> TestProxy {
    let mut table = HostsTable::new();
    for host in hosts {
        table = table.insert(host, Ipv4Addr::LOCALHOST);
    }

    let log_path = unique_log_path();
    let config = Config {
        bind_host: "127.0.0.1".to_owned(),
        log_path: log_path.clone(),
        ..Config::new(0)
    };
    let log = AccessLog::open(&log_path).unwrap();
    let server = Server::bind_with(config, Resolver::new(table), log).await.unwrap();
    let addr = server.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = server.serve_with_shutdown(std::future::pending()).await;
    });

    TestProxy { addr, log_path }
}

/// Starts an origin that answers every connection with `body`, written in
/// `chunk`-sized pieces with a pause between them. Each request head it
/// receives is sent down the returned channel.
pub async fn start_origin(body: Vec<u8>, chunk: usize) -> (u16, mpsc::UnboundedReceiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (heads, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else { break };
            let body = body.clone();
            let heads = heads.clone();
            tokio::spawn(async move {
                let head = read_head(&mut socket).await;
                let _ = heads.send(head);
                for piece in body.chunks(chunk.max(1)) {
                    if socket.write_all(piece).await.is_err() {
                        return;
                    }
                    tokio::time::sleep(Duration::from_micros(50)).await;
                }
            });
        }
    });

    (port, rx)
}

async fn read_head(socket: &mut TcpStream) -> Vec<u8> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match socket.read(&mut byte).await {
            Ok(1) => head.push(byte[0]),
            _ => break,
        }
    }
    head
}

/// Sends `request` through the proxy and reads until it closes the
/// connection.
pub async fn send(proxy: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut client = TcpStream::connect(proxy).await.unwrap();
    client.write_all(request).await.unwrap();
    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), client.read_to_end(&mut response))
        .await
        .expect("proxy closed the connection")
        .unwrap();
    response
}
