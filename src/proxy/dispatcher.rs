//! Accept loop and shutdown sequencing.
//!
//! # Responsibilities
//! - Own the listening socket and the load balancer
//! - Select a backend per accepted client, then hand off to a forwarding task
//! - Refuse synchronously when selection fails
//! - Drain in-flight work and persist sessions on shutdown

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::schema::{HealthCheckConfig, TimeoutConfig};
use crate::config::{validate_config, ProxyConfig};
use crate::error::ProxyError;
use crate::lifecycle::Shutdown;
use crate::load_balancer::{Algorithm, LoadBalancer};
use crate::net::{BackendAddress, Connection, ConnectionTracker};
use crate::observability::metrics;
use crate::proxy::forward::{send_unavailable, Forwarder};
use crate::session::SessionStore;

/// Default bytes read per request and per response.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

#[derive(Debug)]
pub struct ProxyDispatcher {
    listener: Connection,
    balancer: Arc<LoadBalancer>,
    buffer_size: usize,
    timeouts: TimeoutConfig,
    health: HealthCheckConfig,
    tracker: ConnectionTracker,
}

impl ProxyDispatcher {
    /// Validate `config`, bind the socket and build the balancer.
    ///
    /// The socket is bound but not yet accepting; see [`ProxyDispatcher::listen`].
    /// Failing to bind is fatal for the caller; nothing is retried.
    pub async fn bind(config: &ProxyConfig, store: Arc<dyn SessionStore>) -> Result<Self, ProxyError> {
        validate_config(config).map_err(|errors| {
            ProxyError::InvalidConfig(
                errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "),
            )
        })?;

        let bind_address: BackendAddress = config.listener.bind_address.parse()?;
        let backends = config
            .balancing
            .backends
            .iter()
            .map(|b| b.parse::<BackendAddress>())
            .collect::<Result<Vec<_>, _>>()?;
        let algorithm: Algorithm = config.balancing.algorithm.parse()?;

        let mut listener = Connection::bind(&bind_address).await?;
        listener.set_backlog(config.listener.backlog)?;

        let balancer = LoadBalancer::new(backends, store).with_probe_timeout(config.health_check.timeout());
        balancer.set_algorithm(algorithm);

        let mut dispatcher = Self {
            listener,
            balancer: Arc::new(balancer),
            buffer_size: DEFAULT_BUFFER_SIZE,
            timeouts: config.timeouts.clone(),
            health: config.health_check.clone(),
            tracker: ConnectionTracker::new(),
        };
        dispatcher.set_buffer_size(config.listener.buffer_size)?;

        tracing::info!(
            address = ?dispatcher.local_addr(),
            backends = dispatcher.balancer.servers().len(),
            algorithm = %algorithm,
            "Dispatcher bound"
        );
        Ok(dispatcher)
    }

    /// Pending-connection queue length. Rejected once listening.
    pub fn set_backlog(&mut self, backlog: u32) -> Result<(), ProxyError> {
        self.listener.set_backlog(backlog)
    }

    /// Bytes read per request and per response; a positive multiple of 1024.
    pub fn set_buffer_size(&mut self, size: usize) -> Result<(), ProxyError> {
        if size == 0 || size % 1024 != 0 {
            return Err(ProxyError::InvalidBufferSize(size));
        }
        self.buffer_size = size;
        Ok(())
    }

    /// Start accepting into the backlog. Connections queue until `run` picks them up.
    ///
    /// `run` calls this itself; calling it first lets clients connect as soon
    /// as it returns.
    pub fn listen(&mut self) -> Result<(), ProxyError> {
        if self.listener.is_listening() {
            return Ok(());
        }
        self.listener.listen()
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn balancer(&self) -> &Arc<LoadBalancer> {
        &self.balancer
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Accept clients until `shutdown` fires (or its sender is dropped), then drain.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ProxyError> {
        self.listen()?;

        let internal = Shutdown::new();
        let health_task = self.spawn_health_monitor(&internal)?;
        let forwarder = Forwarder::new(
            Arc::clone(&self.balancer),
            self.buffer_size,
            self.timeouts.connect(),
            self.timeouts.backend(),
        );

        tracing::info!(address = ?self.local_addr(), "Dispatcher accepting connections");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((client, peer)) => self.dispatch(&forwarder, client, peer).await,
                    Err(e) => tracing::warn!(error = %e, "Accept failed"),
                }
            }
        }

        self.shutdown(internal, health_task).await;
        Ok(())
    }

    fn spawn_health_monitor(&self, internal: &Shutdown) -> Result<Option<JoinHandle<()>>, ProxyError> {
        if !self.health.enabled {
            tracing::info!("Health checks disabled");
            return Ok(None);
        }
        self.balancer
            .spawn_health_monitor(self.health.interval(), internal.subscribe())
            .map(Some)
    }

    async fn dispatch(&self, forwarder: &Forwarder, mut client: Connection, peer: SocketAddr) {
        metrics::record_connection_accepted();
        client.set_io_timeout(Some(self.timeouts.client()));

        let backend = match self.balancer.select_server(peer) {
            Ok(backend) => backend,
            Err(e) => {
                tracing::warn!(client = %peer, error = %e, "Selection failed, refusing client");
                let reason = match e {
                    ProxyError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
                    _ => "no_healthy_backend",
                };
                send_unavailable(&mut client, reason).await;
                return;
            }
        };

        let guard = self.tracker.track();
        let forwarder = forwarder.clone();
        tracing::debug!(connection_id = %guard.id(), client = %peer, backend = %backend, "Forwarding");
        tokio::spawn(async move {
            forwarder.handle(guard.id(), client, peer, backend).await;
            drop(guard);
        });
    }

    async fn shutdown(mut self, internal: Shutdown, health_task: Option<JoinHandle<()>>) {
        self.balancer.suspend_health_check();
        internal.trigger();
        if let Some(task) = health_task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Health monitor task failed");
            }
        }

        let in_flight = self.tracker.active_count();
        if in_flight > 0 {
            tracing::info!(in_flight, "Waiting for in-flight connections");
        }
        self.tracker.wait_idle().await;

        self.listener.close().await;

        if let Err(e) = self.balancer.store().flush() {
            tracing::error!(error = %e, "Failed to persist session affinity entries");
        }
        tracing::info!("Dispatcher stopped");
    }
}
