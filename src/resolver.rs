//! Host name resolution safe to share between workers.
//!
//! A [`Lookup`] is the classic non-reentrant resolver: it answers a query by
//! overwriting one result slot it owns and handing back a view of that slot.
//! The next query clobbers the previous answer, so two workers calling it at
//! once would read each other's results.
//!
//! [`Resolver`] closes that race with lock-and-copy: lock, look up, copy the
//! whole answer into a [`HostEntry`] the caller owns, unlock. Because a
//! lookup's answer borrows the lookup itself, the borrow checker refuses any
//! use of it once the guard is gone; the copy has to happen under the lock.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

/// An owned copy of a lookup answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostEntry {
    pub name: String,
    /// Never empty.
    pub addrs: Vec<Ipv4Addr>,
}

impl HostEntry {
    /// The address connections go to. Entries handed out by [`Resolver`]
    /// always have one.
    pub fn addr(&self) -> Ipv4Addr {
        self.addrs[0]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no IPv4 address for {0}")]
    NotFound(String),

    #[error("lookup for {0} did not complete")]
    Aborted(String),
}

/// A host lookup that keeps its answer in storage it owns.
pub trait Lookup: Send {
    /// Resolves `host`, overwriting whatever the previous call returned.
    fn lookup(&mut self, host: &str) -> Option<&HostEntry>;
}

/// Resolves names through the operating system.
#[derive(Debug, Default)]
pub struct SystemLookup {
    slot: Option<HostEntry>,
}

impl Lookup for SystemLookup {
    fn lookup(&mut self, host: &str) -> Option<&HostEntry> {
        self.slot = match (host, 0).to_socket_addrs() {
            Ok(found) => {
                let addrs: Vec<Ipv4Addr> = found
                    .filter_map(|addr| match addr.ip() {
                        IpAddr::V4(ip) => Some(ip),
                        IpAddr::V6(_) => None,
                    })
                    .collect();
                (!addrs.is_empty()).then(|| HostEntry { name: host.to_owned(), addrs })
            }
            Err(e) => {
                debug!(host, "system lookup failed: {e}");
                None
            }
        };
        self.slot.as_ref()
    }
}

/// A fixed host table. Dotted-quad names resolve to themselves.
#[derive(Debug, Default)]
pub struct HostsTable {
    hosts: HashMap<String, Vec<Ipv4Addr>>,
    slot: Option<HostEntry>,
}

impl HostsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, host: &str, addr: Ipv4Addr) -> Self {
        self.hosts.entry(host.to_ascii_lowercase()).or_default().push(addr);
        self
    }
}

impl Lookup for HostsTable {
    fn lookup(&mut self, host: &str) -> Option<&HostEntry> {
        let addrs = match host.parse::<Ipv4Addr>() {
            Ok(ip) => Some(vec![ip]),
            Err(_) => self.hosts.get(&host.to_ascii_lowercase()).cloned(),
        };
        self.slot = addrs.map(|addrs| HostEntry { name: host.to_owned(), addrs });
        self.slot.as_ref()
    }
}

/// Lock-guarded front end to a [`Lookup`], shared by every worker.
pub struct Resolver {
    lookup: Mutex<Box<dyn Lookup>>,
}

impl Resolver {
    pub fn new(lookup: impl Lookup + 'static) -> Self {
        Self { lookup: Mutex::new(Box::new(lookup)) }
    }

    pub fn system() -> Self {
        Self::new(SystemLookup::default())
    }

    /// Blocking resolve. The answer is copied out before the lock drops.
    pub fn resolve(&self, host: &str) -> Result<HostEntry, ResolveError> {
        let mut lookup = self.lookup.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = lookup.lookup(host).filter(|e| !e.addrs.is_empty()).cloned();
        drop(lookup);

        entry.ok_or_else(|| ResolveError::NotFound(host.to_owned()))
    }

    /// [`resolve`](Self::resolve) on the blocking pool, so a slow lookup
    /// does not stall the runtime's worker threads.
    pub async fn resolve_async(self: &Arc<Self>, host: &str) -> Result<HostEntry, ResolveError> {
        let resolver = Arc::clone(self);
        let owned = host.to_owned();
        tokio::task::spawn_blocking(move || resolver.resolve(&owned))
            .await
            .map_err(|_| ResolveError::Aborted(host.to_owned()))?
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}
