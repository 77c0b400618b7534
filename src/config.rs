//! Runtime configuration.

use std::path::PathBuf;

/// Initial request buffer capacity, and the line size the proxy expects to
/// see in practice.
pub const MAXLINE: usize = 8192;

/// Everything the listener and its workers need to know up front.
///
/// The binary fills this in from the command line; tests build it directly.
#[derive(Clone, Debug)]
pub struct Config {
    /// Interface to listen on. `0.0.0.0` listens on all of them.
    pub bind_host: String,
    pub port: u16,
    /// Append-only access log.
    pub log_path: PathBuf,
    /// Cap on concurrently live workers. `None` spawns one per connection
    /// with no limit.
    pub max_connections: Option<usize>,
    /// Upper bound for a single upstream read during relay.
    pub relay_chunk_size: usize,
    /// A header block that grows past this is dropped as a bad request.
    pub max_request_bytes: usize,
}

impl Config {
    pub fn new(port: u16) -> Self {
        Self {
            bind_host: "0.0.0.0".to_owned(),
            port,
            log_path: PathBuf::from("proxy.log"),
            max_connections: None,
            relay_chunk_size: MAXLINE,
            max_request_bytes: 1 << 20,
        }
    }

    pub(crate) fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}
