//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_connections_accepted_total` (counter)
//! - `proxy_selections_total` (counter): by outcome (`cache_hit`, `policy`, `no_healthy`, `unsupported`)
//! - `proxy_dial_failures_total` (counter): by backend
//! - `proxy_unavailable_responses_total` (counter): by reason
//! - `proxy_backend_health` (gauge): 1=healthy, 0=unhealthy
//!
//! Recording is a no-op until a recorder is installed with [`init_metrics`].

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connection_accepted() {
    metrics::counter!("proxy_connections_accepted_total").increment(1);
}

pub fn record_selection(outcome: &'static str) {
    metrics::counter!("proxy_selections_total", "outcome" => outcome).increment(1);
}

pub fn record_dial_failure(backend: &str) {
    metrics::counter!("proxy_dial_failures_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_unavailable(reason: &'static str) {
    metrics::counter!("proxy_unavailable_responses_total", "reason" => reason).increment(1);
}

pub fn record_backend_health(backend: &str, healthy: bool) {
    metrics::gauge!("proxy_backend_health", "backend" => backend.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}
