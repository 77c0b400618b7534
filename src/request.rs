//! Request reader.
//!
//! Pulls one complete header block off a client connection: every line up to
//! and including the first blank one. Nothing past the blank line is read
//! into the block; request bodies are not forwarded.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tracing::warn;

use crate::config::MAXLINE;
use crate::error::Failure;

/// A complete header block exactly as the client sent it, request line
/// first, blank line last.
#[derive(Debug)]
pub struct RawRequest {
    bytes: Bytes,
}

impl RawRequest {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Reads lines from `reader` until a blank line ends the header block.
///
/// The block lives in a buffer that starts at [`MAXLINE`] bytes and doubles
/// whenever the next line would not fit. EOF or a read error before the
/// blank line, or a block longer than `limit` bytes, abandons the request.
pub async fn read_request<R>(reader: &mut R, limit: usize) -> Result<RawRequest, Failure>
where
    R: AsyncBufRead + Unpin,
{
    let mut request = BytesMut::with_capacity(MAXLINE);
    let mut line = Vec::with_capacity(MAXLINE);

    loop {
        line.clear();

        // One byte past the remaining budget so an oversized line is
        // distinguishable from one that fits exactly.
        let budget = (limit.saturating_sub(request.len()) as u64).saturating_add(1);
        let n = match (&mut *reader).take(budget).read_until(b'\n', &mut line).await {
            Ok(0) => return Err(Failure::BadRequest("connection closed before end of headers")),
            Ok(n) => n,
            Err(e) => {
                warn!("client read failed: {e}");
                return Err(Failure::BadRequest("read error before end of headers"));
            }
        };

        if request.len() + n > limit {
            return Err(Failure::BadRequest("header block too large"));
        }

        grow(&mut request, n);
        request.extend_from_slice(&line);

        if is_blank(&line) {
            return Ok(RawRequest { bytes: request.freeze() });
        }
    }
}

/// Doubles `buf` until `additional` more bytes fit. Existing bytes are kept.
fn grow(buf: &mut BytesMut, additional: usize) {
    let needed = buf.len() + additional;
    if needed <= buf.capacity() {
        return;
    }

    let mut target = buf.capacity().max(MAXLINE);
    while target < needed {
        target *= 2;
    }
    buf.reserve(target - buf.len());
}

/// The line that ends the header block: a complete line of nothing but
/// whitespace. A trailing fragment cut off by EOF never counts.
fn is_blank(line: &[u8]) -> bool {
    line.ends_with(b"\n") && line.iter().all(u8::is_ascii_whitespace)
}
