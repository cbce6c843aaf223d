//! Error types shared by the balancer and the dispatcher.

use thiserror::Error;

/// Errors produced by registry operations, selection and connection handling.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Binding or resolving a local/remote address failed.
    #[error("address error for {addr}: {reason}")]
    AddressError { addr: String, reason: String },

    /// `add_server` was called for an address already in the registry.
    #[error("backend {0} is already registered")]
    AlreadyRegistered(String),

    /// `remove_server` was called for an address not in the registry.
    #[error("backend {0} is not registered")]
    NotRegistered(String),

    /// The backend was registered but failed its initial probe.
    #[error("backend {0} is registered but unhealthy")]
    BackendUnhealthy(String),

    /// Every registered backend is currently marked unhealthy.
    #[error("no healthy backend available")]
    NoHealthyBackend,

    /// The requested balancing algorithm is unknown or not implemented.
    #[error("load balancing algorithm {0:?} is not supported")]
    UnsupportedAlgorithm(String),

    /// Connecting to the chosen backend failed or timed out.
    #[error("failed to dial backend {addr}: {reason}")]
    BackendDialFailure { addr: String, reason: String },

    #[error("invalid backlog {0}: must be greater than zero")]
    InvalidBacklog(u32),

    #[error("invalid buffer size {0}: must be a positive multiple of 1024")]
    InvalidBufferSize(usize),

    /// The request bytes did not carry a usable `Host:` header.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("invalid health check interval {0:?}: must be greater than zero")]
    InvalidInterval(std::time::Duration),

    /// A configuration handed to the dispatcher failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("socket operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("socket is not in the expected state: {0}")]
    NotListening(&'static str),

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}

impl ProxyError {
    /// True for errors that should be answered with the unavailable payload.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            ProxyError::NoHealthyBackend
                | ProxyError::BackendDialFailure { .. }
                | ProxyError::UnsupportedAlgorithm(_)
        )
    }
}
