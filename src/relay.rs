//! Relay: send the rewritten request upstream, stream the response back.
//!
//! Failure handling is lopsided. A failed write to either peer
//! is only a warning and the loop keeps going. A failed upstream read ends
//! the loop the same way a clean close does.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{trace, warn};

use crate::uri::Target;

/// Forwards one request and its response.
///
/// `headers` is everything after the client's request line, blank line
/// included, and is sent verbatim after the rewritten request line.
/// Returns the number of response bytes written to `client`.
pub async fn relay<U, C>(
    upstream: &mut U,
    client: &mut C,
    target: &Target,
    headers: &[u8],
    chunk_size: usize,
) -> u64
where
    U: AsyncRead + AsyncWrite + Unpin,
    C: AsyncWrite + Unpin,
{
    send_request(upstream, target, headers).await;

    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;

    loop {
        let n = match upstream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!("upstream read failed: {e}");
                break;
            }
        };

        match client.write_all(&buf[..n]).await {
            Ok(()) => {
                total += n as u64;
                trace!(bytes = n, "forwarded chunk to client");
            }
            Err(e) => warn!(bytes = n, "client write failed: {e}"),
        }
    }

    if let Err(e) = client.flush().await {
        warn!("client flush failed: {e}");
    }

    total
}

async fn send_request<U>(upstream: &mut U, target: &Target, headers: &[u8])
where
    U: AsyncWrite + Unpin,
{
    let line = target.request_line();
    let mut request = BytesMut::with_capacity(line.len() + headers.len());
    request.extend_from_slice(line.as_bytes());
    request.extend_from_slice(headers);

    if let Err(e) = upstream.write_all(&request).await {
        warn!("upstream write failed: {e}");
    }
    if let Err(e) = upstream.flush().await {
        warn!("upstream flush failed: {e}");
    }
}
