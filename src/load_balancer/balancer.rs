//! The load balancer front door.
//!
//! # Responsibilities
//! - Own the registry, the algorithm setting and the session store
//! - Answer `select_server(client)` with cache-first, policy-second selection
//! - Register/unregister backends at runtime
//! - Hand out the health monitor that keeps the registry fresh

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::ProxyError;
use crate::health::{probe::probe, HealthMonitor, HealthSwitch};
use crate::load_balancer::{Algorithm, ServerRegistry};
use crate::net::BackendAddress;
use crate::observability::metrics;
use crate::session::SessionStore;

/// Probe timeout used by `add_server` until overridden.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

pub struct LoadBalancer {
    registry: ServerRegistry,
    algorithm: AtomicU8,
    store: Arc<dyn SessionStore>,
    health: HealthSwitch,
    probe_timeout: Duration,
}

impl LoadBalancer {
    /// Every initial backend starts healthy; the first probe pass corrects that.
    pub fn new(backends: impl IntoIterator<Item = BackendAddress>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            registry: ServerRegistry::new(backends),
            algorithm: AtomicU8::new(Algorithm::default() as u8),
            store,
            health: HealthSwitch::default(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    // --- Selection ---

    /// Pick a backend for a client socket address.
    pub fn select_server(&self, client: SocketAddr) -> Result<BackendAddress, ProxyError> {
        self.select_for_key(&BackendAddress::from(client).to_string())
    }

    /// Pick a backend for a client identity string (`"host:port"`).
    pub fn select_for_key(&self, client_key: &str) -> Result<BackendAddress, ProxyError> {
        if let Some(cached) = self.store.get(client_key) {
            match cached.parse::<BackendAddress>() {
                Ok(backend) if self.registry.is_healthy(&backend) => {
                    tracing::debug!(client = %client_key, backend = %backend, "Session affinity hit");
                    metrics::record_selection("cache_hit");
                    return Ok(backend);
                }
                _ => {
                    tracing::debug!(client = %client_key, cached = %cached, "Dropping stale session affinity entry");
                    self.store.delete(client_key);
                }
            }
        }

        let algorithm = self.algorithm();
        let chosen = self
            .registry
            .select_with(|healthy, state| algorithm.strategy().select(healthy, client_key, state))
            .inspect_err(|e| match e {
                ProxyError::NoHealthyBackend => {
                    tracing::warn!(client = %client_key, "No healthy backend available");
                    metrics::record_selection("no_healthy");
                }
                ProxyError::UnsupportedAlgorithm(_) => {
                    tracing::error!(client = %client_key, algorithm = %algorithm, "Selection with unsupported algorithm");
                    metrics::record_selection("unsupported");
                }
                _ => {}
            })?;

        self.store.set(client_key, &chosen.to_string());
        tracing::debug!(client = %client_key, backend = %chosen, algorithm = %algorithm, "Backend selected");
        metrics::record_selection("policy");
        Ok(chosen)
    }

    /// Passive health signal: the dispatcher could not reach `backend`.
    pub fn report_dial_failure(&self, backend: &BackendAddress) {
        if self.registry.set_health(backend, false) {
            tracing::warn!(backend = %backend, "Backend marked unhealthy after dial failure");
            metrics::record_backend_health(&backend.to_string(), false);
        }
    }

    // --- Algorithm ---

    pub fn algorithm(&self) -> Algorithm {
        Algorithm::from(self.algorithm.load(Ordering::SeqCst))
    }

    /// Accepts every known algorithm; unimplemented ones fail at selection time.
    pub fn set_algorithm(&self, algorithm: Algorithm) {
        self.algorithm.store(algorithm as u8, Ordering::SeqCst);
        tracing::info!(algorithm = %algorithm, "Load balancing algorithm updated");
    }

    /// Set the algorithm by name. Unknown names leave the current setting in place.
    pub fn set_algorithm_named(&self, name: &str) -> Result<(), ProxyError> {
        let algorithm = name.parse::<Algorithm>()?;
        self.set_algorithm(algorithm);
        Ok(())
    }

    // --- Registry ---

    /// Register a backend after probing it.
    ///
    /// An unreachable backend is still registered (unhealthy) and reported as
    /// `BackendUnhealthy` so a later probe can bring it back.
    pub async fn add_server(&self, addr: BackendAddress) -> Result<(), ProxyError> {
        if self.registry.contains(&addr) {
            return Err(ProxyError::AlreadyRegistered(addr.to_string()));
        }

        let healthy = probe(&addr, self.probe_timeout).await;
        self.registry.insert(addr.clone(), healthy)?;
        metrics::record_backend_health(&addr.to_string(), healthy);

        if healthy {
            tracing::info!(backend = %addr, "Backend added");
            Ok(())
        } else {
            tracing::warn!(backend = %addr, "Backend added but unhealthy");
            Err(ProxyError::BackendUnhealthy(addr.to_string()))
        }
    }

    pub fn remove_server(&self, addr: &BackendAddress) -> Result<(), ProxyError> {
        self.registry.remove(addr).inspect_err(|_| {
            tracing::warn!(backend = %addr, "Attempted to remove unknown backend");
        })?;
        tracing::info!(backend = %addr, "Backend removed");
        Ok(())
    }

    pub fn servers(&self) -> Vec<(BackendAddress, bool)> {
        self.registry.snapshot()
    }

    pub fn healthy_servers(&self) -> Vec<BackendAddress> {
        self.registry.healthy()
    }

    // --- Health checking ---

    /// Fails with `InvalidInterval` when `interval` is zero.
    pub fn health_monitor(&self, interval: Duration) -> Result<HealthMonitor, ProxyError> {
        HealthMonitor::new(
            self.registry.clone(),
            self.health.clone(),
            interval,
            self.probe_timeout,
        )
    }

    /// Spawn the probe loop on the current runtime.
    pub fn spawn_health_monitor(
        &self,
        interval: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<JoinHandle<()>, ProxyError> {
        let monitor = self.health_monitor(interval)?;
        Ok(tokio::spawn(monitor.run(shutdown)))
    }

    /// Stop probing after the current pass. Health flags stay as they are.
    pub fn suspend_health_check(&self) {
        self.health.suspend();
        tracing::info!("Health checks suspended");
    }

    pub fn resume_health_check(&self) {
        self.health.resume();
        tracing::info!("Health checks resumed");
    }

    pub fn health_check_active(&self) -> bool {
        self.health.is_active()
    }
}

impl std::fmt::Debug for LoadBalancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadBalancer")
            .field("registry", &self.registry)
            .field("algorithm", &self.algorithm())
            .field("health_check_active", &self.health_check_active())
            .finish()
    }
}
