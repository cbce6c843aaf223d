//! Owned socket wrapper.
//!
//! # Responsibilities
//! - Bind a listening socket with address/port reuse
//! - Dial backends with a bounded connect timeout
//! - Send/receive single buffers under an optional I/O deadline
//! - Track liveness (`is_alive`) across listen/dial/close
//!
//! # Design Decisions
//! - Composition over a tokio socket; the wrapper owns exactly one handle
//! - The handle moves through `Bound -> Listening` or is a `Stream` from the start
//! - Closing is idempotent and always leaves the wrapper dead

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::time;

use crate::error::ProxyError;
use crate::net::address::BackendAddress;

/// Listen backlog used until `set_backlog` is called.
pub const DEFAULT_BACKLOG: u32 = 10;

enum Socket {
    Bound(TcpSocket),
    Listening(TcpListener),
    Stream(TcpStream),
    Closed,
}

/// A single socket handle plus the metadata the proxy needs about it.
pub struct Connection {
    socket: Socket,
    local_addr: Option<SocketAddr>,
    peer_addr: Option<SocketAddr>,
    backlog: u32,
    io_timeout: Option<Duration>,
    alive: bool,
}

impl Connection {
    /// Bind a listening-role socket to `addr` with SO_REUSEADDR (and SO_REUSEPORT on unix).
    pub async fn bind(addr: &BackendAddress) -> Result<Self, ProxyError> {
        let resolved = addr.resolve().await?;
        let address_error = |e: io::Error| ProxyError::AddressError {
            addr: addr.to_string(),
            reason: e.to_string(),
        };

        let socket = if resolved.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(address_error)?;

        socket.set_reuseaddr(true).map_err(address_error)?;
        #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
        socket.set_reuseport(true).map_err(address_error)?;
        socket.bind(resolved).map_err(address_error)?;

        let local_addr = socket.local_addr().map_err(address_error)?;
        tracing::debug!(address = %local_addr, "Socket bound");

        Ok(Self {
            socket: Socket::Bound(socket),
            local_addr: Some(local_addr),
            peer_addr: None,
            backlog: DEFAULT_BACKLOG,
            io_timeout: None,
            alive: false,
        })
    }

    /// Dial `addr`, giving up after `timeout`.
    pub async fn dial(addr: &BackendAddress, timeout: Duration) -> Result<Self, ProxyError> {
        let dial_failure = |reason: String| ProxyError::BackendDialFailure {
            addr: addr.to_string(),
            reason,
        };

        let stream = match time::timeout(timeout, TcpStream::connect((addr.host(), addr.port()))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(dial_failure(e.to_string())),
            Err(_) => return Err(dial_failure(format!("connect timed out after {timeout:?}"))),
        };

        let peer = stream.peer_addr().map_err(|e| dial_failure(e.to_string()))?;
        Ok(Self::from_stream(stream, peer))
    }

    fn from_stream(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            local_addr: stream.local_addr().ok(),
            socket: Socket::Stream(stream),
            peer_addr: Some(peer),
            backlog: DEFAULT_BACKLOG,
            io_timeout: None,
            alive: true,
        }
    }

    /// Change the listen backlog. Rejected once the socket is listening.
    pub fn set_backlog(&mut self, backlog: u32) -> Result<(), ProxyError> {
        if backlog == 0 {
            return Err(ProxyError::InvalidBacklog(backlog));
        }
        if self.is_listening() {
            return Err(ProxyError::NotListening("backlog must be set before listen"));
        }
        self.backlog = backlog;
        Ok(())
    }

    /// Deadline applied to every `send` and `receive`.
    pub fn set_io_timeout(&mut self, timeout: Option<Duration>) {
        self.io_timeout = timeout;
    }

    /// Put a bound socket into the accepting state.
    pub fn listen(&mut self) -> Result<(), ProxyError> {
        match std::mem::replace(&mut self.socket, Socket::Closed) {
            Socket::Bound(socket) => {
                let listener = socket.listen(self.backlog).map_err(|e| ProxyError::AddressError {
                    addr: self
                        .local_addr
                        .map(|a| a.to_string())
                        .unwrap_or_else(|| "unbound".to_string()),
                    reason: e.to_string(),
                })?;
                self.socket = Socket::Listening(listener);
                self.alive = true;
                tracing::info!(address = ?self.local_addr, backlog = self.backlog, "Listening for connections");
                Ok(())
            }
            other => {
                self.socket = other;
                Err(ProxyError::NotListening("listen requires a freshly bound socket"))
            }
        }
    }

    /// Accept one peer. The returned connection is alive and owns the peer stream.
    pub async fn accept(&self) -> Result<(Connection, SocketAddr), ProxyError> {
        let Socket::Listening(listener) = &self.socket else {
            return Err(ProxyError::NotListening("accept requires a listening socket"));
        };

        let (stream, peer) = listener.accept().await?;
        tracing::debug!(peer_addr = %peer, "Connection accepted");
        Ok((Connection::from_stream(stream, peer), peer))
    }

    /// Write the whole buffer.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), ProxyError> {
        let limit = self.io_timeout;
        let stream = self.stream_mut()?;
        with_deadline(limit, stream.write_all(data)).await
    }

    /// Read at most `max` bytes in a single read. An empty result means the peer closed.
    pub async fn receive(&mut self, max: usize) -> Result<Vec<u8>, ProxyError> {
        let limit = self.io_timeout;
        let stream = self.stream_mut()?;
        let mut buf = vec![0u8; max];
        let n = with_deadline(limit, stream.read(&mut buf)).await?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Release the handle. Safe to call more than once.
    pub async fn close(&mut self) {
        if let Socket::Stream(stream) = &mut self.socket {
            // Peer may already be gone; nothing useful to do with the error.
            let _ = stream.shutdown().await;
        }
        self.socket = Socket::Closed;
        self.alive = false;
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_listening(&self) -> bool {
        matches!(self.socket, Socket::Listening(_))
    }

    pub fn backlog(&self) -> u32 {
        self.backlog
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream, ProxyError> {
        match &mut self.socket {
            Socket::Stream(stream) => Ok(stream),
            _ => Err(ProxyError::NotListening("data transfer requires a connected stream")),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("local_addr", &self.local_addr)
            .field("peer_addr", &self.peer_addr)
            .field("backlog", &self.backlog)
            .field("alive", &self.alive)
            .finish()
    }
}

async fn with_deadline<T>(
    limit: Option<Duration>,
    op: impl Future<Output = io::Result<T>>,
) -> Result<T, ProxyError> {
    match limit {
        Some(limit) => time::timeout(limit, op)
            .await
            .map_err(|_| ProxyError::Timeout(limit))?
            .map_err(ProxyError::from),
        None => op.await.map_err(ProxyError::from),
    }
}
