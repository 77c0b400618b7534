//! Access log: one line per forwarded request.
//!
//! ```text
//! Tue 05 Mar 2024 09:07:09 -05:00: 10.0.0.7 http://example.com/index.html 500
//! ```
//!
//! Timestamp in local time (`%Z` prints the numeric UTC offset), client
//! address, the URI exactly as the client sent it, and the number of response
//! bytes relayed. Lines from concurrent workers never interleave; their order is the order the workers took the
//! log lock, not the order their requests arrived.

use std::fmt::Display;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Local, TimeZone};

use crate::error::Error;

const TIME_FORMAT: &str = "%a %d %b %Y %H:%M:%S %Z";

/// Shared, append-only access log.
pub struct AccessLog {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl AccessLog {
    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::from_writer(file))
    }

    pub fn from_writer(sink: impl Write + Send + 'static) -> Self {
        Self { sink: Mutex::new(Box::new(sink)) }
    }

    /// Appends one entry and flushes it before releasing the lock.
    pub fn append(&self, client: IpAddr, uri: &str, bytes: u64) -> io::Result<()> {
        let entry = format_entry(&Local::now(), client_ipv4(client), uri);

        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(sink, "{entry} {bytes}")?;
        sink.flush()
    }
}

impl std::fmt::Debug for AccessLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessLog").finish_non_exhaustive()
    }
}

/// `<time>: <a>.<b>.<c>.<d> <uri>`, without the byte count.
pub fn format_entry<Tz>(when: &DateTime<Tz>, client: Ipv4Addr, uri: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let [a, b, c, d] = client.octets();
    format!("{}: {a}.{b}.{c}.{d} {uri}", when.format(TIME_FORMAT))
}

/// The listener only binds IPv4, but a v4-mapped v6 peer is still a v4 one.
fn client_ipv4(ip: IpAddr) -> Ipv4Addr {
    match ip {
        IpAddr::V4(ip) => ip,
        IpAddr::V6(ip) => ip.to_ipv4_mapped().unwrap_or(Ipv4Addr::UNSPECIFIED),
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv6Addr;
    use std::sync::Arc;
    use std::thread;

    use chrono::{FixedOffset, Utc};

    use super::*;

    /// In-memory sink the test keeps a handle to.
    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Shared {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn entry_format() {
        let when = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let entry = format_entry(&when, Ipv4Addr::new(10, 0, 0, 7), "http://example.com/index.html");
        assert_eq!(entry, "Tue 05 Mar 2024 14:07:09 UTC: 10.0.0.7 http://example.com/index.html");
    }

    #[test]
    fn local_entries_carry_a_numeric_offset() {
        let est = FixedOffset::west_opt(5 * 3600).unwrap();
        let when = est.with_ymd_and_hms(2024, 3, 5, 9, 7, 9).unwrap();
        let entry = format_entry(&when, Ipv4Addr::new(10, 0, 0, 7), "http://example.com/index.html");
        assert_eq!(entry, "Tue 05 Mar 2024 09:07:09 -05:00: 10.0.0.7 http://example.com/index.html");
    }

    #[test]
    fn octets_are_in_network_order() {
        let when = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let entry = format_entry(&when, Ipv4Addr::from(0xC0A8_0102), "u");
        assert!(entry.ends_with(": 192.168.1.2 u"), "{entry}");
    }

    #[test]
    fn append_writes_entry_and_byte_count() {
        let sink = Shared::default();
        let log = AccessLog::from_writer(sink.clone());

        log.append(IpAddr::V4(Ipv4Addr::LOCALHOST), "http://example.com/", 500).unwrap();

        let contents = sink.contents();
        assert!(contents.ends_with(": 127.0.0.1 http://example.com/ 500\n"), "{contents}");
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn mapped_v6_clients_log_as_v4() {
        let mapped = Ipv4Addr::new(172, 16, 0, 9).to_ipv6_mapped();
        assert_eq!(client_ipv4(IpAddr::V6(mapped)), Ipv4Addr::new(172, 16, 0, 9));
        assert_eq!(client_ipv4(IpAddr::V6(Ipv6Addr::LOCALHOST)), Ipv4Addr::UNSPECIFIED);
    }

    #[test]
    fn concurrent_appends_never_interleave() {
        let sink = Shared::default();
        let log = AccessLog::from_writer(sink.clone());

        thread::scope(|s| {
            for t in 0..8u8 {
                let log = &log;
                s.spawn(move || {
                    for i in 0..100u64 {
                        let uri = format!("http://host{t}.test/{i}");
                        log.append(IpAddr::V4(Ipv4Addr::new(10, 0, 0, t)), &uri, i).unwrap();
                    }
                });
            }
        });

        let contents = sink.contents();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 800);
        for line in lines {
            let mut fields = line.rsplitn(3, ' ');
            let bytes = fields.next().unwrap();
            let uri = fields.next().unwrap();
            let t = &uri["http://host".len()..uri.find(".test").unwrap()];
            assert!(fields.next().unwrap().ends_with(&format!(": 10.0.0.{t}")), "{line}");
            assert!(uri.ends_with(&format!("/{bytes}")), "{line}");
        }
    }

    #[test]
    fn open_appends_to_existing_file() {
        let path = std::env::temp_dir().join(format!("ferry-access-{}.log", std::process::id()));
        std::fs::write(&path, "earlier line\n").unwrap();

        let log = AccessLog::open(&path).unwrap();
        log.append(IpAddr::V4(Ipv4Addr::LOCALHOST), "http://a/", 3).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(contents.starts_with("earlier line\n"));
        assert!(contents.ends_with(" 127.0.0.1 http://a/ 3\n"));
    }
}
