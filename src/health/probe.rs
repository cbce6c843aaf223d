//! TCP connect-and-close probe.

use std::time::Duration;

use crate::net::{BackendAddress, Connection};

/// True if a TCP connection to `addr` opens within `timeout`. No payload is exchanged.
pub async fn probe(addr: &BackendAddress, timeout: Duration) -> bool {
    match Connection::dial(addr, timeout).await {
        Ok(mut connection) => {
            connection.close().await;
            true
        }
        Err(e) => {
            tracing::debug!(backend = %addr, error = %e, "Health probe failed");
            false
        }
    }
}
