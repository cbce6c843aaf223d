//! TCP Balancing Proxy Library

pub mod config;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod session;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use lifecycle::Shutdown;
pub use load_balancer::{Algorithm, LoadBalancer};
pub use net::BackendAddress;
pub use proxy::ProxyDispatcher;
pub use session::{MemorySessionStore, SessionStore};
