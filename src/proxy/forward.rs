//! Per-connection forwarding task.
//!
//! # Responsibilities
//! - Read one request buffer from the client
//! - Dial the chosen backend, re-selecting once on dial failure
//! - Relay one request and one response, then close both sides
//! - Answer with the unavailable payload when no backend can take the request

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ProxyError;
use crate::load_balancer::LoadBalancer;
use crate::net::tracker::ConnectionId;
use crate::net::{BackendAddress, Connection};
use crate::observability::metrics;
use crate::proxy::host::parse_host;
use crate::proxy::UNAVAILABLE_PAYLOAD;

/// Shared settings for every forwarding task spawned by one dispatcher.
#[derive(Debug, Clone)]
pub struct Forwarder {
    balancer: Arc<LoadBalancer>,
    buffer_size: usize,
    connect_timeout: Duration,
    backend_timeout: Duration,
}

impl Forwarder {
    pub fn new(
        balancer: Arc<LoadBalancer>,
        buffer_size: usize,
        connect_timeout: Duration,
        backend_timeout: Duration,
    ) -> Self {
        Self {
            balancer,
            buffer_size,
            connect_timeout,
            backend_timeout,
        }
    }

    /// Serve exactly one exchange for `client`. Always closes the client.
    pub async fn handle(
        &self,
        id: ConnectionId,
        mut client: Connection,
        peer: SocketAddr,
        backend: BackendAddress,
    ) {
        match self.exchange(&mut client, peer, backend).await {
            Ok(()) => {}
            Err(e) if e.is_unavailable() => {
                tracing::warn!(connection_id = %id, client = %peer, error = %e, "No backend could serve the request");
                send_unavailable(&mut client, "dial_failed").await;
            }
            Err(e) => {
                tracing::warn!(connection_id = %id, client = %peer, error = %e, "Forwarding failed");
            }
        }
        client.close().await;
    }

    async fn exchange(
        &self,
        client: &mut Connection,
        peer: SocketAddr,
        backend: BackendAddress,
    ) -> Result<(), ProxyError> {
        let request = client.receive(self.buffer_size).await?;
        if request.is_empty() {
            tracing::debug!(client = %peer, "Client closed before sending a request");
            return Ok(());
        }

        match parse_host(&request) {
            Ok((port, host)) => tracing::debug!(client = %peer, host = %host, port, "Request received"),
            Err(e) => tracing::debug!(client = %peer, error = %e, "Request without usable Host header"),
        }

        let (mut upstream, backend) = self.dial_with_retry(peer, backend).await?;
        upstream.set_io_timeout(Some(self.backend_timeout));

        let relayed = relay(client, &mut upstream, &request, self.buffer_size).await;
        upstream.close().await;

        match relayed {
            Ok(bytes) => {
                tracing::debug!(client = %peer, backend = %backend, request_bytes = request.len(), response_bytes = bytes, "Exchange complete");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(client = %peer, backend = %backend, error = %e, "Relay failed");
                Err(e)
            }
        }
    }

    /// Dial `backend`; on failure mark it unhealthy, re-select once and dial the new pick.
    async fn dial_with_retry(
        &self,
        peer: SocketAddr,
        backend: BackendAddress,
    ) -> Result<(Connection, BackendAddress), ProxyError> {
        match Connection::dial(&backend, self.connect_timeout).await {
            Ok(upstream) => Ok((upstream, backend)),
            Err(first) => {
                tracing::warn!(client = %peer, backend = %backend, error = %first, "Backend dial failed, re-selecting");
                self.mark_failed(&backend);

                let retry = self.balancer.select_server(peer)?;
                let upstream = Connection::dial(&retry, self.connect_timeout)
                    .await
                    .inspect_err(|_| self.mark_failed(&retry))?;
                tracing::info!(client = %peer, failed = %backend, backend = %retry, "Retry dial succeeded");
                Ok((upstream, retry))
            }
        }
    }

    fn mark_failed(&self, backend: &BackendAddress) {
        metrics::record_dial_failure(&backend.to_string());
        self.balancer.report_dial_failure(backend);
    }
}

/// Send `request` upstream and pass one response buffer back. Returns the response size.
async fn relay(
    client: &mut Connection,
    upstream: &mut Connection,
    request: &[u8],
    buffer_size: usize,
) -> Result<usize, ProxyError> {
    upstream.send(request).await?;
    let response = upstream.receive(buffer_size).await?;
    if !response.is_empty() {
        client.send(&response).await?;
    }
    Ok(response.len())
}

/// Best-effort unavailable answer followed by close.
pub async fn send_unavailable(client: &mut Connection, reason: &'static str) {
    metrics::record_unavailable(reason);
    if let Err(e) = client.send(UNAVAILABLE_PAYLOAD).await {
        tracing::debug!(error = %e, "Could not deliver unavailable payload");
    }
    client.close().await;
}
