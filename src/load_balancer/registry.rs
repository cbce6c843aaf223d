//! Backend health registry.
//!
//! # Responsibilities
//! - Hold the `address -> healthy` map and the rotation cursor
//! - Guard both with one mutex, held only for in-memory work
//! - Accept whole-map replacement from the health monitor
//!
//! # Design Decisions
//! - `BTreeMap` gives a deterministic snapshot order (host, then port)
//! - A poisoned lock is recovered rather than propagated; the data is plain values

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::ProxyError;
use crate::net::BackendAddress;

/// Round-robin rotation cursor shared by every selection call.
#[derive(Debug, Default)]
pub struct SelectionState {
    cursor: usize,
}

impl SelectionState {
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Return the index for a healthy set of `len` servers and advance the cursor.
    ///
    /// `len` must be non-zero.
    pub fn advance(&mut self, len: usize) -> usize {
        let index = self.cursor % len;
        self.cursor = (index + 1) % len;
        index
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    servers: BTreeMap<BackendAddress, bool>,
    selection: SelectionState,
}

/// Shared handle to the backend registry.
#[derive(Debug, Clone, Default)]
pub struct ServerRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl ServerRegistry {
    /// Build a registry where every initial backend starts healthy.
    pub fn new(initial: impl IntoIterator<Item = BackendAddress>) -> Self {
        let servers = initial.into_iter().map(|addr| (addr, true)).collect();
        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                servers,
                selection: SelectionState::default(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, addr: &BackendAddress) -> bool {
        self.lock().servers.contains_key(addr)
    }

    /// Health flag of `addr`, or `None` if it is not registered.
    pub fn health(&self, addr: &BackendAddress) -> Option<bool> {
        self.lock().servers.get(addr).copied()
    }

    pub fn is_healthy(&self, addr: &BackendAddress) -> bool {
        self.health(addr).unwrap_or(false)
    }

    /// Insert a new address. Fails if it is already a key.
    pub fn insert(&self, addr: BackendAddress, healthy: bool) -> Result<(), ProxyError> {
        let mut inner = self.lock();
        if inner.servers.contains_key(&addr) {
            return Err(ProxyError::AlreadyRegistered(addr.to_string()));
        }
        inner.servers.insert(addr, healthy);
        Ok(())
    }

    pub fn remove(&self, addr: &BackendAddress) -> Result<(), ProxyError> {
        match self.lock().servers.remove(addr) {
            Some(_) => Ok(()),
            None => Err(ProxyError::NotRegistered(addr.to_string())),
        }
    }

    /// Flip the flag of a registered address. Returns false if it is unknown.
    pub fn set_health(&self, addr: &BackendAddress, healthy: bool) -> bool {
        match self.lock().servers.get_mut(addr) {
            Some(flag) => {
                *flag = healthy;
                true
            }
            None => false,
        }
    }

    /// Swap in a freshly probed map, returning the one it replaced.
    pub fn replace(&self, servers: BTreeMap<BackendAddress, bool>) -> BTreeMap<BackendAddress, bool> {
        std::mem::replace(&mut self.lock().servers, servers)
    }

    pub fn addresses(&self) -> Vec<BackendAddress> {
        self.lock().servers.keys().cloned().collect()
    }

    pub fn snapshot(&self) -> Vec<(BackendAddress, bool)> {
        self.lock()
            .servers
            .iter()
            .map(|(addr, healthy)| (addr.clone(), *healthy))
            .collect()
    }

    pub fn healthy(&self) -> Vec<BackendAddress> {
        healthy_of(&self.lock().servers)
    }

    pub fn len(&self) -> usize {
        self.lock().servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().servers.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.lock().selection.cursor()
    }

    /// Run `select` against the current healthy snapshot with the lock held.
    ///
    /// Fails with `NoHealthyBackend` without calling `select` when nothing is healthy.
    pub fn select_with<F>(&self, select: F) -> Result<BackendAddress, ProxyError>
    where
        F: FnOnce(&[BackendAddress], &mut SelectionState) -> Result<BackendAddress, ProxyError>,
    {
        let mut inner = self.lock();
        let healthy = healthy_of(&inner.servers);
        if healthy.is_empty() {
            return Err(ProxyError::NoHealthyBackend);
        }
        select(&healthy, &mut inner.selection)
    }
}

fn healthy_of(servers: &BTreeMap<BackendAddress, bool>) -> Vec<BackendAddress> {
    servers
        .iter()
        .filter(|(_, healthy)| **healthy)
        .map(|(addr, _)| addr.clone())
        .collect()
}
