//! TCP proxy front end.
//!
//! # Data Flow
//! ```text
//! accept (dispatcher.rs)
//!     → LoadBalancer::select_server(client)
//!         → failure: unavailable payload, close
//!     → spawn forward.rs task
//!         → read one request buffer
//!         → host.rs (log the Host header)
//!         → dial backend (one re-selection on dial failure)
//!         → send request, read one response, relay, close both
//! ```
//!
//! # Design Decisions
//! - One exchange per client connection; no keep-alive
//! - Bytes relayed verbatim; the Host header is informational only
//! - Forwarding tasks are unbounded; shutdown waits for them to drain

pub mod dispatcher;
pub mod forward;
pub mod host;

pub use dispatcher::ProxyDispatcher;
pub use host::parse_host;

/// Sent verbatim to a client when no backend can serve it.
pub const UNAVAILABLE_PAYLOAD: &[u8] = br#"{"status_code": 500, "message": "Server unavailable"}"#;
