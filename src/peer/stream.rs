//! Byte streams carried through tunnels

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::debug;

use crate::models::TunnelAddress;

/// Bidirectional byte stream
pub trait TunnelIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> TunnelIo for T {}

/// Owned, type-erased tunnel stream
pub type TunnelStream = Box<dyn TunnelIo>;

/// A relayed stream arriving from a hub, ready for the accept pipeline
pub struct InboundTunnel {
    /// `tunnel:<hub>:<origin>`
    pub address: TunnelAddress,
    pub stream: TunnelStream,
}

impl std::fmt::Debug for InboundTunnel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundTunnel")
            .field("address", &self.address)
            .finish()
    }
}

/// Callback that hands inbound tunnels to the local accept pipeline
pub type ConnectHandler = Arc<dyn Fn(InboundTunnel) + Send + Sync>;

/// Stream that fails on first use.
///
/// Returned in place of a real tunnel when a bridge request cannot be
/// served, so the RPC layer still gets a duplex to hand back.
#[derive(Debug, Clone)]
pub struct RefusedStream {
    message: String,
}

impl RefusedStream {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn error(&self) -> io::Error {
        io::Error::new(io::ErrorKind::ConnectionRefused, self.message.clone())
    }
}

impl AsyncRead for RefusedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(self.error()))
    }
}

impl AsyncWrite for RefusedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(self.error()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Dialed tunnel. Logs the first I/O failure; retrying is up to the caller.
pub struct TunnelConnection {
    address: TunnelAddress,
    inner: TunnelStream,
    broken: bool,
}

impl TunnelConnection {
    pub fn new(address: TunnelAddress, inner: TunnelStream) -> Self {
        Self {
            address,
            inner,
            broken: false,
        }
    }

    pub fn address(&self) -> &TunnelAddress {
        &self.address
    }

    pub fn into_inner(self) -> TunnelStream {
        self.inner
    }

    fn observe<T>(&mut self, poll: Poll<io::Result<T>>) -> Poll<io::Result<T>> {
        if let Poll::Ready(Err(e)) = &poll {
            if !self.broken {
                self.broken = true;
                debug!("tunnel duplex broken with {} because {}", self.address, e);
            }
        }
        poll
    }
}

impl std::fmt::Debug for TunnelConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunnelConnection")
            .field("address", &self.address)
            .field("broken", &self.broken)
            .finish()
    }
}

impl AsyncRead for TunnelConnection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        this.observe(poll)
    }
}

impl AsyncWrite for TunnelConnection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        this.observe(poll)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_flush(cx);
        this.observe(poll)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_shutdown(cx);
        this.observe(poll)
    }
}
