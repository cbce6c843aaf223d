//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → stop accepting → stop health loop
//!     → drain in-flight forwarding tasks → close listener → persist sessions
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
