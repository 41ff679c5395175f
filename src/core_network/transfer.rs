//! Chunked byte copying between the storage driver and a data connection.
//!
//! Every chunk boundary checks the session's abort token, so closing the control
//! connection or shutting the server down stops an in-flight transfer.

use super::DataChannelError;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Copies `source` (storage) into `sink` (data connection) until end of stream.
pub async fn send_stream<R, W>(
    source: &mut R,
    sink: &mut W,
    abort: &CancellationToken,
    buffer_size: usize,
) -> Result<u64, DataChannelError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buffer = vec![0; buffer_size.max(1)];
    let mut total = 0u64;
    loop {
        let bytes_read = tokio::select! {
            biased;
            _ = abort.cancelled() => return Err(DataChannelError::Aborted),
            read = source.read(&mut buffer) => read.map_err(DataChannelError::Storage)?,
        };
        if bytes_read == 0 {
            break;
        }
        tokio::select! {
            biased;
            _ = abort.cancelled() => return Err(DataChannelError::Aborted),
            written = sink.write_all(&buffer[..bytes_read]) => written.map_err(DataChannelError::Connection)?,
        }
        total += bytes_read as u64;
    }
    sink.flush().await.map_err(DataChannelError::Connection)?;
    Ok(total)
}

/// Wraps the inbound data connection handed to a driver during an upload. Once
/// the token is cancelled the next read fails with `ConnectionAborted`.
pub struct AbortableReader<'a, R: ?Sized> {
    inner: &'a mut R,
    abort: CancellationToken,
    received: u64,
}

impl<'a, R: AsyncRead + Unpin + ?Sized> AbortableReader<'a, R> {
    pub fn new(inner: &'a mut R, abort: CancellationToken) -> Self {
        Self {
            inner,
            abort,
            received: 0,
        }
    }

    pub fn received(&self) -> u64 {
        self.received
    }
}

impl<'a, R: AsyncRead + Unpin + ?Sized> AsyncRead for AbortableReader<'a, R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.abort.is_cancelled() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "transfer aborted",
            )));
        }
        let before = buf.filled().len();
        let result = Pin::new(&mut *this.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &result {
            this.received += (buf.filled().len() - before) as u64;
        }
        result
    }
}
