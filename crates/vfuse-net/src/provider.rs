//! Sources of the single duplex stream a [`Connection`](crate::Connection)
//! runs over.

use std::future::Future;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;

use crate::error::NetError;

/// Any bidirectional byte stream the transport can run over.
pub trait DuplexStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> DuplexStream for T {}

pub type BoxedStream = Box<dyn DuplexStream>;

/// Produces the stream for one connection. Consumed by the first use, so
/// it is never asked twice.
#[async_trait]
pub trait ConnectionProvider: Send + 'static {
    async fn connect(self: Box<Self>) -> Result<BoxedStream, NetError>;
}

// ---------------------------------------------------------------------------
// TCP
// ---------------------------------------------------------------------------

/// Waits for one inbound TCP connection on an already bound listener.
pub struct TcpAcceptor {
    listener: tokio::net::TcpListener,
}

impl TcpAcceptor {
    pub async fn bind(addr: SocketAddr) -> Result<Self, NetError> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "TCP listener bound");
        Ok(Self { listener })
    }

    pub fn from_listener(listener: tokio::net::TcpListener) -> Self {
        Self { listener }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        Ok(self.listener.local_addr()?)
    }
}

#[async_trait]
impl ConnectionProvider for TcpAcceptor {
    async fn connect(self: Box<Self>) -> Result<BoxedStream, NetError> {
        let (stream, peer) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        info!(%peer, "peer connected");
        // The listener is dropped here: exactly one peer per filesystem.
        Ok(Box::new(stream))
    }
}

/// Dials a peer that is already listening.
pub struct TcpConnector {
    addr: SocketAddr,
}

impl TcpConnector {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

#[async_trait]
impl ConnectionProvider for TcpConnector {
    async fn connect(self: Box<Self>) -> Result<BoxedStream, NetError> {
        let stream = tokio::net::TcpStream::connect(self.addr).await?;
        stream.set_nodelay(true)?;
        info!(peer = %self.addr, "connected to peer");
        Ok(Box::new(stream))
    }
}

// ---------------------------------------------------------------------------
// In-process providers
// ---------------------------------------------------------------------------

/// A stream that is already established.
pub struct ReadyStream<S>(pub S);

#[async_trait]
impl<S: DuplexStream> ConnectionProvider for ReadyStream<S> {
    async fn connect(self: Box<Self>) -> Result<BoxedStream, NetError> {
        Ok(Box::new(self.0))
    }
}

/// Wraps a one-shot async closure.
pub struct FnProvider<F>(F);

pub fn provider_fn<F, Fut, S>(f: F) -> FnProvider<F>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<S, NetError>> + Send + 'static,
    S: DuplexStream,
{
    FnProvider(f)
}

#[async_trait]
impl<F, Fut, S> ConnectionProvider for FnProvider<F>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<S, NetError>> + Send + 'static,
    S: DuplexStream,
{
    async fn connect(self: Box<Self>) -> Result<BoxedStream, NetError> {
        let stream = (self.0)().await?;
        Ok(Box::new(stream))
    }
}
