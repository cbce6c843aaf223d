//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every registered backend
//! - Build a complete replacement map off-lock, then swap it in once
//! - Honour a cooperative suspend/resume switch, checked once per pass
//!
//! A backend added while a pass is running may be missing from that pass's
//! replacement map; it comes back on the next pass.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::error::ProxyError;
use crate::health::probe::probe;
use crate::load_balancer::ServerRegistry;
use crate::observability::metrics;

/// Cooperative on/off switch for the probe loop.
#[derive(Debug, Clone)]
pub struct HealthSwitch(Arc<AtomicBool>);

impl HealthSwitch {
    pub fn new(active: bool) -> Self {
        Self(Arc::new(AtomicBool::new(active)))
    }

    pub fn suspend(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for HealthSwitch {
    fn default() -> Self {
        Self::new(true)
    }
}

#[derive(Debug)]
pub struct HealthMonitor {
    registry: ServerRegistry,
    switch: HealthSwitch,
    interval: Duration,
    probe_timeout: Duration,
}

impl HealthMonitor {
    /// Fails with `InvalidInterval` for a zero period.
    pub fn new(
        registry: ServerRegistry,
        switch: HealthSwitch,
        interval: Duration,
        probe_timeout: Duration,
    ) -> Result<Self, ProxyError> {
        if interval.is_zero() {
            return Err(ProxyError::InvalidInterval(interval));
        }
        Ok(Self {
            registry,
            switch,
            interval,
            probe_timeout,
        })
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            probe_timeout_ms = self.probe_timeout.as_millis() as u64,
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.switch.is_active() {
                        self.check_all().await;
                    } else {
                        tracing::trace!("Health checks suspended, skipping pass");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every registered backend and swap the results into the registry.
    pub async fn check_all(&self) {
        let addresses = self.registry.addresses();
        let results = join_all(addresses.iter().map(|addr| probe(addr, self.probe_timeout))).await;

        let fresh: BTreeMap<_, _> = addresses.into_iter().zip(results).collect();
        for (addr, healthy) in &fresh {
            metrics::record_backend_health(&addr.to_string(), *healthy);
        }

        let healthy_count = fresh.values().filter(|h| **h).count();
        let total = fresh.len();
        let previous = self.registry.replace(fresh.clone());

        for (addr, healthy) in &fresh {
            match previous.get(addr) {
                Some(was) if was != healthy => {
                    if *healthy {
                        tracing::info!(backend = %addr, "Backend recovered");
                    } else {
                        tracing::warn!(backend = %addr, "Backend marked unhealthy");
                    }
                }
                _ => {}
            }
        }

        tracing::debug!(healthy = healthy_count, total, "Health pass complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::net::BackendAddress;
    use tokio::net::TcpListener;

    async fn closed_port() -> BackendAddress {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        BackendAddress::from(listener.local_addr().unwrap())
    }

    fn monitor(registry: &ServerRegistry, switch: &HealthSwitch) -> HealthMonitor {
        HealthMonitor::new(
            registry.clone(),
            switch.clone(),
            Duration::from_millis(20),
            Duration::from_millis(200),
        )
        .unwrap()
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = HealthMonitor::new(
            ServerRegistry::default(),
            HealthSwitch::default(),
            Duration::ZERO,
            Duration::from_millis(200),
        )
        .unwrap_err();
        assert!(matches!(err, ProxyError::InvalidInterval(d) if d.is_zero()));
    }

    #[tokio::test]
    async fn check_all_toggles_flags_without_removing() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let up = BackendAddress::from(listener.local_addr().unwrap());
        let down = closed_port().await;

        let registry = ServerRegistry::new(vec![up.clone(), down.clone()]);
        monitor(&registry, &HealthSwitch::default()).check_all().await;

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.health(&up), Some(true));
        assert_eq!(registry.health(&down), Some(false));
    }

    #[tokio::test]
    async fn suspended_monitor_leaves_registry_alone() {
        let down = closed_port().await;
        let registry = ServerRegistry::new(vec![down.clone()]);
        let switch = HealthSwitch::new(false);
        let shutdown = Shutdown::new();

        let task = tokio::spawn(monitor(&registry, &switch).run(shutdown.subscribe()));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(registry.health(&down), Some(true), "no pass should run while suspended");

        switch.resume();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(registry.health(&down), Some(false));

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("monitor should exit on shutdown")
            .unwrap();
    }
}
