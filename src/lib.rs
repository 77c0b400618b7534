//! # ferry
//!
//! A small concurrent HTTP forwarding proxy.
//!
//! ## The contract
//!
//! Clients send proxy-style requests:
//!
//! ```text
//! GET http://example.com:8080/index.html HTTP/1.1
//! Host: example.com
//!
//! ```
//!
//! ferry rewrites the request line to `GET /index.html HTTP/1.0`, passes the
//! remaining header lines through untouched, connects to the origin and
//! streams whatever comes back to the client until the origin closes. One
//! line per forwarded request goes to the access log.
//!
//! Anything else (another method, another scheme, a version other than
//! HTTP/1.0 or HTTP/1.1, a connection that closes before the blank line)
//! gets no response at all. The connection is simply closed.
//!
//! Not supported: methods other than `GET`, request bodies, `CONNECT`/TLS,
//! keep-alive to the origin, caching, IPv6 origins.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use ferry::{Config, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     Server::bind(Config::new(15213)).await.unwrap().serve().await.unwrap();
//! }
//! ```

mod access_log;
mod config;
mod connection;
mod connector;
mod error;
mod relay;
mod request;
mod resolver;
mod server;
mod uri;

pub use access_log::{AccessLog, format_entry};
pub use config::{Config, MAXLINE};
pub use connection::{ConnectionContext, Proxy, handle};
pub use connector::{ConnectError, connect};
pub use error::{Error, Failure};
pub use relay::relay;
pub use request::{RawRequest, read_request};
pub use resolver::{HostEntry, HostsTable, Lookup, ResolveError, Resolver, SystemLookup};
pub use server::Server;
pub use uri::{RequestLine, Target};
