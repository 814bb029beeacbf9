//! Response framing for stream transports
//!
//! Stream sockets deliver partial reads, so the reply is accumulated until
//! the blank line that ends a SIP header block shows up, or until the buffer
//! reaches [`MAX_RESPONSE_SIZE`]. Message bodies are not read: an OPTIONS
//! probe only needs the status line.

use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

use super::{notify_sent, ProbeResponse, TransportEvent};
use crate::error::{Error, Result};
use crate::request::{ProbeRequest, MESSAGE_TERMINATOR};

/// Hard cap on an accumulated response
pub const MAX_RESPONSE_SIZE: usize = 65_536;

/// Size of a single socket read
pub const READ_CHUNK_SIZE: usize = 4_096;

const TERMINATOR: &[u8] = MESSAGE_TERMINATOR.as_bytes();

/// Whether `buf` holds a complete reply: a blank-line terminator anywhere in
/// it, or the size cap reached.
pub fn is_complete(buf: &[u8]) -> bool {
    buf.len() >= MAX_RESPONSE_SIZE || contains_terminator(buf, 0)
}

fn contains_terminator(buf: &[u8], from: usize) -> bool {
    buf[from..].windows(TERMINATOR.len()).any(|w| w == TERMINATOR)
}

/// Read from `reader` until the reply is complete.
///
/// End of stream before completion is reported as
/// [`Error::ConnectionClosed`].
pub async fn read_response<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = Vec::with_capacity(READ_CHUNK_SIZE);
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        let room = (MAX_RESPONSE_SIZE - buf.len()).min(READ_CHUNK_SIZE);
        let n = reader.read(&mut chunk[..room]).await?;
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }

        // Only the new bytes and the three before them can complete a terminator
        let scan_from = buf.len().saturating_sub(TERMINATOR.len() - 1);
        buf.extend_from_slice(&chunk[..n]);

        if contains_terminator(&buf, scan_from) {
            return Ok(buf);
        }
        if buf.len() >= MAX_RESPONSE_SIZE {
            debug!("Response reached {} bytes without a terminator", MAX_RESPONSE_SIZE);
            return Ok(buf);
        }
    }
}

/// Write `request` to an established stream, announce it, and read the reply.
///
/// Shared by the TCP and TLS transports.
pub async fn exchange_stream<S>(
    stream: &mut S,
    request: &ProbeRequest,
    events: &mpsc::Sender<TransportEvent>,
) -> Result<ProbeResponse>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    stream.write_all(request.as_bytes()).await?;
    stream.flush().await?;
    let sent_at = Instant::now();
    debug!("Wrote {} byte request", request.as_bytes().len());
    notify_sent(events, request).await;

    let buf = read_response(stream).await?;
    Ok(ProbeResponse::from_bytes(&buf, sent_at.elapsed()))
}
