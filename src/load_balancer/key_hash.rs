//! Key-hash load balancing strategy.
//!
//! Plain modulo hashing over the healthy snapshot, not consistent hashing:
//! a key stays on the same backend only while the healthy set (size and
//! order) is unchanged. Adding or losing a healthy server remaps many keys.

use sha2::{Digest, Sha256};

use crate::error::ProxyError;
use crate::load_balancer::{SelectionState, Strategy};
use crate::net::BackendAddress;

/// Picks `healthy[digest(client_key) % N]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyHash;

impl KeyHash {
    pub fn new() -> Self {
        Self
    }
}

/// Stable 64-bit digest of `key`: the first eight bytes of its SHA-256, big-endian.
pub fn digest(key: &str) -> u64 {
    let hash = Sha256::digest(key.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash[..8]);
    u64::from_be_bytes(prefix)
}

impl Strategy for KeyHash {
    fn select(
        &self,
        healthy: &[BackendAddress],
        client_key: &str,
        _state: &mut SelectionState,
    ) -> Result<BackendAddress, ProxyError> {
        if healthy.is_empty() {
            return Err(ProxyError::NoHealthyBackend);
        }
        let index = (digest(client_key) % healthy.len() as u64) as usize;
        Ok(healthy[index].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn servers(n: u16) -> Vec<BackendAddress> {
        (0..n).map(|i| BackendAddress::new("10.0.0.1", 8000 + i)).collect()
    }

    #[test]
    fn digest_is_stable() {
        assert_eq!(digest("127.0.0.1:47951"), digest("127.0.0.1:47951"));
        assert_ne!(digest("127.0.0.1:47951"), digest("127.0.0.1:47952"));
        // SHA-256("abc") begins ba7816bf8f01cfea.
        assert_eq!(digest("abc"), 0xba78_16bf_8f01_cfea);
    }

    #[test]
    fn same_key_same_backend() {
        let backends = servers(3);
        let mut state = SelectionState::default();
        let first = KeyHash.select(&backends, "user:123", &mut state).unwrap();
        for _ in 0..10 {
            assert_eq!(KeyHash.select(&backends, "user:123", &mut state).unwrap(), first);
        }
        assert_eq!(state.cursor(), 0, "key hash must not touch the rotation cursor");
    }

    #[test]
    fn keys_spread_across_backends() {
        let backends = servers(4);
        let mut state = SelectionState::default();
        let hit: HashSet<_> = (0..200)
            .map(|i| KeyHash.select(&backends, &format!("192.168.1.{i}:5000"), &mut state).unwrap())
            .collect();
        assert_eq!(hit.len(), 4);
    }
}
