//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Proxy bind address
//!     → connection.rs (bind with reuse, listen with backlog)
//!     → accept loop hands each peer Connection to the dispatcher
//!     → tracker.rs (in-flight count for graceful shutdown)
//!
//! Backend dial:
//!     address.rs (host:port) → connection.rs (bounded connect) → one exchange → close
//! ```
//!
//! # Design Decisions
//! - One `Connection` owns one socket; no inheritance from tokio types
//! - Every backend dial and read has a deadline
//! - No accept semaphore: concurrency is unbounded per connection

pub mod address;
pub mod connection;
pub mod tracker;

pub use address::BackendAddress;
pub use connection::Connection;
pub use tracker::ConnectionTracker;
