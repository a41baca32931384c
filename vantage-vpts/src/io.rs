//! Frame I/O over compio streams.
//!
//! These are the only functions in the workspace that touch raw socket
//! buffers. Both are generic over compio's `AsyncRead`/`AsyncWrite`, so a
//! worker can drive them through a shared `&TcpStream`.

use bytes::{Bytes, BytesMut};
use compio::buf::{BufResult, IntoInner, IoBuf};
use compio::io::{AsyncRead, AsyncWrite};
use std::io;
use tracing::{debug, trace};
use vantage_core::error::Result;

use crate::codec::{encode_frame, FrameDecoder};

/// Default size of each socket read.
pub const READ_SIZE: usize = 4096;

/// Write one frame carrying `payload`.
///
/// Loops on partial writes until the whole frame has been accepted by the
/// stream. Returns the number of bytes written (header included).
pub async fn write_frame<S>(stream: &mut S, payload: &[u8]) -> Result<usize>
where
    S: AsyncWrite + Unpin,
{
    let mut buf = encode_frame(payload).to_vec();
    let total = buf.len();
    let mut sent = 0;

    while sent < total {
        let BufResult(res, slice) = stream.write(buf.slice(sent..)).await;
        buf = slice.into_inner();
        let n = res?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("stream accepted {sent} of {total} frame bytes"),
            )
            .into());
        }
        sent += n;
        trace!("[vpts] wrote {} bytes ({}/{})", n, sent, total);
    }

    assert_eq!(sent, total, "short frame write");
    stream.flush().await?;
    Ok(sent)
}

/// Read one frame and return its payload.
///
/// Reads `chunk_size` bytes at a time until the header and the declared
/// number of payload bytes have arrived. A stream that ends first is a
/// protocol error, never a short payload.
pub async fn read_frame<S>(stream: &mut S, chunk_size: usize, max_len: Option<usize>) -> Result<Bytes>
where
    S: AsyncRead + Unpin,
{
    let chunk_size = chunk_size.max(1);
    let mut decoder = FrameDecoder::new().with_max_len(max_len);
    let mut acc = BytesMut::with_capacity(chunk_size);
    let mut chunk = Vec::with_capacity(chunk_size);

    loop {
        chunk.clear();
        let BufResult(res, buf) = stream.read(chunk).await;
        chunk = buf;
        let n = res?;

        if n == 0 {
            debug!(
                "[vpts] stream ended with {} of {:?} payload bytes",
                decoder.received_len(),
                decoder.expected_len()
            );
            return Err(decoder.eof_error().into());
        }

        acc.extend_from_slice(&chunk[..n]);
        if let Some(payload) = decoder.decode(&mut acc)? {
            if !acc.is_empty() {
                debug!("[vpts] discarding {} bytes after frame", acc.len());
            }
            return Ok(payload);
        }
    }
}
