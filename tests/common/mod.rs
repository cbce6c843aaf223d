//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use balancing_proxy::config::ProxyConfig;
use balancing_proxy::session::{MemorySessionStore, SessionStore};
use balancing_proxy::{LoadBalancer, ProxyDispatcher, ProxyError, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub const GET: &[u8] = b"GET / HTTP/1.1\r\nHost: localhost:8000\r\n\r\n";

/// A raw-TCP backend that answers every connection with one fixed response.
pub struct MockBackend {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Start a backend that reads one buffer and replies with an HTTP 200 carrying `body`.
pub async fn start_mock_backend(body: &'static str) -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let counter = counter.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        if n == 0 {
                            return;
                        }
                        counter.fetch_add(1, Ordering::SeqCst);
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockBackend { addr, hits }
}

/// Start a backend that writes back whatever single buffer it receives.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                if let Ok(n) = socket.read(&mut buf).await {
                    let _ = socket.write_all(&buf[..n]).await;
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// An address nothing listens on.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A live backend and a dead address where the dead one sorts first in the registry.
pub async fn dead_then_live(body: &'static str) -> (SocketAddr, MockBackend) {
    loop {
        let dead = dead_address().await;
        let live = start_mock_backend(body).await;
        if dead.port() < live.addr.port() {
            return (dead, live);
        }
    }
}

/// Minimal config: ephemeral bind port, health checks off, short timeouts.
pub fn proxy_config(backends: &[SocketAddr]) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.balancing.backends = backends.iter().map(ToString::to_string).collect();
    config.health_check.enabled = false;
    config.health_check.timeout_ms = 200;
    config.timeouts.client_secs = 2;
    config.timeouts.connect_secs = 1;
    config.timeouts.backend_secs = 2;
    config
}

pub struct RunningProxy {
    pub addr: SocketAddr,
    pub balancer: Arc<LoadBalancer>,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), ProxyError>>,
}

impl RunningProxy {
    pub async fn stop(self) -> Result<(), ProxyError> {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("dispatcher did not stop")
            .expect("dispatcher task panicked")
    }
}

pub async fn start_proxy(config: ProxyConfig) -> RunningProxy {
    start_proxy_with_store(config, Arc::new(MemorySessionStore::default())).await
}

pub async fn start_proxy_with_store(config: ProxyConfig, store: Arc<dyn SessionStore>) -> RunningProxy {
    let mut dispatcher = ProxyDispatcher::bind(&config, store).await.unwrap();
    dispatcher.listen().unwrap();
    let addr = dispatcher.local_addr().unwrap();
    let balancer = dispatcher.balancer().clone();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(dispatcher.run(shutdown.subscribe()));

    RunningProxy {
        addr,
        balancer,
        shutdown,
        handle,
    }
}

/// Open a client connection, send `request`, read until the proxy closes.
pub async fn send_request(proxy: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    if !request.is_empty() {
        stream.write_all(request).await.unwrap();
    }
    read_until_closed(&mut stream).await
}

pub async fn read_until_closed(stream: &mut TcpStream) -> Vec<u8> {
    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .expect("proxy did not close the connection")
        .unwrap();
    response
}

pub fn body_of(response: &[u8]) -> String {
    let text = String::from_utf8_lossy(response);
    text.split("\r\n\r\n").nth(1).unwrap_or_default().to_string()
}
