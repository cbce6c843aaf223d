//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields (logging.rs installs the subscriber)
//!     → metrics.rs counters and gauges (Prometheus scrape endpoint)
//! ```
//!
//! # Design Decisions
//! - Connection IDs and backend addresses are log fields, not message text
//! - Metric updates are cheap enough to sit on the accept path

pub mod logging;
pub mod metrics;
