//! Round-robin load balancing strategy.
//!
//! Fairness is best effort: the cursor is shared across calls but the
//! healthy set may change between them, so a strict single visit per cycle
//! only holds while the set is stable.

use crate::error::ProxyError;
use crate::load_balancer::{SelectionState, Strategy};
use crate::net::BackendAddress;

/// Rotates through the healthy snapshot with the shared cursor.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoundRobin;

impl RoundRobin {
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for RoundRobin {
    fn select(
        &self,
        healthy: &[BackendAddress],
        _client_key: &str,
        state: &mut SelectionState,
    ) -> Result<BackendAddress, ProxyError> {
        if healthy.is_empty() {
            return Err(ProxyError::NoHealthyBackend);
        }
        let index = state.advance(healthy.len());
        Ok(healthy[index].clone())
    }
}
