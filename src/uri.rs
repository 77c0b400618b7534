//! Request line validation and proxy URI decomposition.
//!
//! A proxy request line looks like
//!
//! ```text
//! GET http://example.com:8080/index.html HTTP/1.1
//! ```
//!
//! and is checked in two stages. [`RequestLine::parse`] accepts only `GET`,
//! a single URI token and one of the two HTTP/1.x version tokens.
//! [`Target`] then splits the URI token into host, port and path.

use std::fmt;
use std::str::FromStr;

use http::Version;

use crate::error::Failure;

const SCHEME: &str = "http://";
const DEFAULT_PORT: u16 = 80;

/// Bytes that end the host part of a URI.
const HOST_DELIMITERS: [char; 6] = [' ', ':', '/', '\r', '\n', '\0'];

/// A validated `GET` request line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestLine {
    /// The URI token verbatim. This is what the access log records.
    pub uri: String,
    pub version: Version,
}

impl RequestLine {
    /// Validates the first line of `head`.
    ///
    /// On success also returns the offset of the first header line, so the
    /// caller can pass the remaining lines through untouched.
    pub fn parse(head: &[u8]) -> Result<(Self, usize), Failure> {
        let rest = head
            .strip_prefix(b"GET ")
            .ok_or(Failure::BadRequest("not a GET request"))?;

        let eol = rest
            .iter()
            .position(|&b| b == b'\n')
            .ok_or(Failure::BadRequest("unterminated request line"))?;
        let line = &rest[..eol];
        let line = line.strip_suffix(b"\r").unwrap_or(line);

        let space = line
            .iter()
            .position(|&b| b == b' ')
            .ok_or(Failure::BadRequest("couldn't find the end of the uri"))?;
        if space == 0 {
            return Err(Failure::BadRequest("empty uri"));
        }

        let version = match &line[space + 1..] {
            b"HTTP/1.0" => Version::HTTP_10,
            b"HTTP/1.1" => Version::HTTP_11,
            _ => return Err(Failure::BadRequest("unsupported http version")),
        };

        let uri = std::str::from_utf8(&line[..space])
            .map_err(|_| Failure::BadRequest("uri is not valid utf-8"))?
            .to_owned();

        Ok((Self { uri, version }, "GET ".len() + eol + 1))
    }
}

/// Where a request goes: the origin host, its port and the path on it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    /// Everything after the first `/` following the host. Empty means root.
    pub path: String,
}

impl Target {
    /// The request line sent upstream. Always HTTP/1.0, always origin-form.
    pub fn request_line(&self) -> String {
        format!("GET /{} HTTP/1.0\r\n", self.path)
    }
}

/// Parses an absolute `http://host[:port][/path]` URI.
impl FromStr for Target {
    type Err = Failure;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        let scheme = uri.get(..SCHEME.len()).ok_or(Failure::BadUri("missing http:// prefix"))?;
        if !scheme.eq_ignore_ascii_case(SCHEME) {
            return Err(Failure::BadUri("missing http:// prefix"));
        }
        let rest = &uri[SCHEME.len()..];

        let host_end = rest.find(HOST_DELIMITERS).unwrap_or(rest.len());
        let host = &rest[..host_end];
        if host.is_empty() {
            return Err(Failure::BadUri("empty host"));
        }

        let mut after_host = &rest[host_end..];
        let mut port = DEFAULT_PORT;
        if let Some(digits) = after_host.strip_prefix(':') {
            let len = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
            port = digits[..len]
                .parse()
                .ok()
                .filter(|&p| p != 0)
                .ok_or(Failure::BadUri("invalid port"))?;
            after_host = &digits[len..];
        }

        let path = match after_host.strip_prefix('/') {
            Some(path) => path,
            None if after_host.is_empty() => "",
            None => return Err(Failure::BadUri("junk after host")),
        };

        Ok(Self {
            host: host.to_owned(),
            port,
            path: path.to_owned(),
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.path)
    }
}
