//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the balancing proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, backlog, buffer size).
    pub listener: ListenerConfig,

    /// Selection algorithm and initial backend set.
    pub balancing: BalancingConfig,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Session affinity persistence.
    pub session: SessionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8000").
    pub bind_address: String,

    /// Pending connection queue length.
    pub backlog: u32,

    /// Bytes read per request and per response. Multiple of 1024.
    pub buffer_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
            backlog: 10,
            buffer_size: 4096,
        }
    }
}

/// Backend set and selection policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BalancingConfig {
    /// Algorithm name (e.g., "round_robin", "ip_hash").
    pub algorithm: String,

    /// Initial backends as "host:port".
    pub backends: Vec<String>,
}

impl Default for BalancingConfig {
    fn default() -> Self {
        Self {
            algorithm: "round_robin".to_string(),
            backends: Vec::new(),
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the periodic probe loop.
    pub enabled: bool,

    /// Delay between probe passes in milliseconds.
    pub interval_ms: u64,

    /// Per-probe connect timeout in milliseconds.
    pub timeout_ms: u64,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 1000,
            timeout_ms: 1000,
        }
    }
}

/// Timeout configuration for the two sides of a relay.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Client socket read/write timeout in seconds.
    pub client_secs: u64,

    /// Backend connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Backend socket read/write timeout in seconds.
    pub backend_secs: u64,
}

impl TimeoutConfig {
    pub fn client(&self) -> Duration {
        Duration::from_secs(self.client_secs)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn backend(&self) -> Duration {
        Duration::from_secs(self.backend_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            client_secs: 10,
            connect_secs: 10,
            backend_secs: 10,
        }
    }
}

/// Session affinity configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SessionConfig {
    /// JSON file loaded at startup and written on shutdown. In-memory only when absent.
    pub persistence_path: Option<PathBuf>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
