//! Decision Storage
//!
//! - `DecisionHistory`: bounded in-memory ring buffer consulted every cycle
//! - `PersistenceStore`: best-effort durable sink for decision records and
//!   escalation bundles (in-memory or sled)

pub mod decision_history;
pub mod persistence;

pub use decision_history::DecisionHistory;
pub use persistence::{InMemoryStore, PersistenceError, PersistenceStore, SledStore};

use std::sync::Arc;

use crate::config::{StorageConfig, StoreBackend};

/// Open the backend selected by `[storage]`.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn PersistenceStore>, PersistenceError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryStore::new(config.memory_capacity))),
        StoreBackend::Sled => Ok(Arc::new(SledStore::open(&config.path)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_store_selects_backend() {
        let memory = open_store(&StorageConfig::default()).unwrap();
        assert_eq!(memory.backend_name(), "InMemory");

        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            backend: StoreBackend::Sled,
            path: dir.path().join("kiln.db"),
            ..StorageConfig::default()
        };
        assert_eq!(open_store(&config).unwrap().backend_name(), "sled");
    }
}
