//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → probe.rs (TCP connect + close per backend, bounded timeout)
//!     → full replacement map
//!     → one locked swap into the registry
//!
//! Passive signal:
//!     Dispatcher dial failure
//!     → LoadBalancer::report_dial_failure flips the flag to unhealthy
//!     → next active pass restores it if the backend answers again
//! ```
//!
//! # Design Decisions
//! - Probes never run under the registry lock
//! - Probe failures only flip flags; they are never surfaced to callers
//! - The loop never removes addresses

pub mod active;
pub mod probe;

pub use active::{HealthMonitor, HealthSwitch};
