//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (backlog > 0, buffer size in KiB steps, intervals > 0)
//! - Check that every address and the algorithm name parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;
use crate::load_balancer::Algorithm;
use crate::net::BackendAddress;

/// One semantic problem with a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<BackendAddress>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a host:port pair", config.listener.bind_address),
        ));
    }
    if config.listener.backlog == 0 {
        errors.push(ValidationError::new("listener.backlog", "must be greater than zero"));
    }
    let buffer_size = config.listener.buffer_size;
    if buffer_size == 0 || buffer_size % 1024 != 0 {
        errors.push(ValidationError::new(
            "listener.buffer_size",
            format!("{buffer_size} is not a positive multiple of 1024"),
        ));
    }

    if config.balancing.algorithm.parse::<Algorithm>().is_err() {
        errors.push(ValidationError::new(
            "balancing.algorithm",
            format!("unknown algorithm '{}'", config.balancing.algorithm),
        ));
    }
    for (i, backend) in config.balancing.backends.iter().enumerate() {
        if let Err(e) = backend.parse::<BackendAddress>() {
            errors.push(ValidationError::new(format!("balancing.backends[{i}]"), e.to_string()));
        }
    }

    if config.health_check.interval_ms == 0 {
        errors.push(ValidationError::new("health_check.interval_ms", "must be greater than zero"));
    }
    if config.health_check.timeout_ms == 0 {
        errors.push(ValidationError::new("health_check.timeout_ms", "must be greater than zero"));
    }

    let timeouts = [
        ("timeouts.client_secs", config.timeouts.client_secs),
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.backend_secs", config.timeouts.backend_secs),
    ];
    for (field, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
