//! In-process session store with optional JSON persistence.

use dashmap::DashMap;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::session::SessionStore;

/// A concurrent client → backend map.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<DashMap<String, String>>,
    persistence_path: Option<PathBuf>,
}

impl MemorySessionStore {
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            persistence_path,
        }
    }

    /// Open a store backed by `path`, loading existing entries if the file exists.
    pub fn load_from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let store = Self::new(Some(path.to_path_buf()));
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let map: HashMap<String, String> = serde_json::from_reader(reader)?;
            for (client, backend) in map {
                store.inner.insert(client, backend);
            }
            tracing::info!(path = %path.display(), entries = store.inner.len(), "Loaded session affinity entries");
        }
        Ok(store)
    }

    /// Write all entries to the persistence path. A store without one is a no-op.
    pub fn save_to_file(&self) -> std::io::Result<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        let map: HashMap<String, String> = self
            .inner
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, &map)?;
        tracing::info!(path = %path.display(), entries = map.len(), "Saved session affinity entries");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, client_key: &str) -> Option<String> {
        self.inner.get(client_key).map(|entry| entry.value().clone())
    }

    fn set(&self, client_key: &str, backend_key: &str) {
        self.inner.insert(client_key.to_string(), backend_key.to_string());
    }

    fn delete(&self, client_key: &str) {
        self.inner.remove(client_key);
    }

    fn flush(&self) -> std::io::Result<()> {
        self.save_to_file()
    }
}
