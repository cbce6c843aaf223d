//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Client address → balancer.rs (select_server)
//!     → session store lookup (sticky hit on a healthy backend wins)
//!     → registry.rs (healthy snapshot, under the lock)
//!     → algorithm.rs picks the strategy:
//!         - round_robin.rs (rotate with the shared cursor)
//!         - key_hash.rs (digest of the client key, modulo N)
//!         - Unsupported (typed error, no fallback)
//!     → record choice in the session store
//! ```
//!
//! # Design Decisions
//! - Registry map and cursor share one mutex
//! - Strategies are stateless; the cursor lives in `SelectionState`
//! - Unhealthy backends excluded from selection

pub mod algorithm;
pub mod balancer;
pub mod key_hash;
pub mod registry;
pub mod round_robin;

pub use algorithm::Algorithm;
pub use balancer::LoadBalancer;
pub use registry::{SelectionState, ServerRegistry};

use crate::error::ProxyError;
use crate::net::BackendAddress;

/// A selection policy over a healthy snapshot.
///
/// Runs with the registry lock held, so implementations must not block.
pub trait Strategy: Send + Sync + std::fmt::Debug {
    fn select(
        &self,
        healthy: &[BackendAddress],
        client_key: &str,
        state: &mut SelectionState,
    ) -> Result<BackendAddress, ProxyError>;
}
