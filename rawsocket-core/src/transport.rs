//! Transport layer abstraction
//!
//! The engine only needs "read some bytes" and "write all of these bytes",
//! with the read and write sides usable from different tasks at once. Any
//! tokio stream (TCP, TLS, in-memory duplex) fits through the blanket impls.

use crate::error::Result;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read side of a transport
#[async_trait]
pub trait TransportRead: Send {
    /// Read up to `buf.len()` bytes; `Ok(0)` means end of stream
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Write side of a transport
#[async_trait]
pub trait TransportWrite: Send {
    /// Write all data to the stream
    async fn write_all(&mut self, buf: &[u8]) -> Result<()>;

    /// Flush the stream
    async fn flush(&mut self) -> Result<()>;

    /// Shut down the write direction
    async fn shutdown(&mut self) -> Result<()>;
}

/// A duplex byte stream the engine can take ownership of
pub trait TransportStream: Send + 'static {
    /// Split into independently usable read and write halves
    fn split(self: Box<Self>) -> (Box<dyn TransportRead>, Box<dyn TransportWrite>);
}

#[async_trait]
impl<R> TransportRead for R
where
    R: AsyncRead + Unpin + Send,
{
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(AsyncReadExt::read(self, buf).await?)
    }
}

#[async_trait]
impl<W> TransportWrite for W
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        Ok(AsyncWriteExt::write_all(self, buf).await?)
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(AsyncWriteExt::flush(self).await?)
    }

    async fn shutdown(&mut self) -> Result<()> {
        Ok(AsyncWriteExt::shutdown(self).await?)
    }
}

impl<S> TransportStream for S
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn split(self: Box<Self>) -> (Box<dyn TransportRead>, Box<dyn TransportWrite>) {
        let (read_half, write_half) = tokio::io::split(*self);
        (Box::new(read_half), Box::new(write_half))
    }
}
