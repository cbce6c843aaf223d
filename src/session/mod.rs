//! Session affinity.
//!
//! # Data Flow
//! ```text
//! select_server(client)
//!     → store.get("client_host:client_port")
//!     → hit + backend healthy: reuse it
//!     → hit + backend unhealthy: store.delete, fall through to the policy
//!     → policy pick → store.set(client, "backend_host:backend_port")
//! ```
//!
//! # Design Decisions
//! - The store is a capability injected into the balancer, not a global client
//! - Each call is atomic on its own; the balancer adds no locking around them
//! - No TTL: entries only expire through health-driven invalidation

pub mod memory;

pub use memory::MemorySessionStore;

/// Key-value capability backing sticky sessions.
///
/// Keys and values are `"<host>:<port>"` strings.
pub trait SessionStore: Send + Sync {
    fn get(&self, client_key: &str) -> Option<String>;

    fn set(&self, client_key: &str, backend_key: &str);

    fn delete(&self, client_key: &str);

    /// Persist entries, if the store has somewhere to put them.
    fn flush(&self) -> std::io::Result<()> {
        Ok(())
    }
}
