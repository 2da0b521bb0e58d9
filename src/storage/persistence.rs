//! PersistenceStore trait: pluggable durable record sink
//!
//! Decision records and escalation bundles are appended best-effort; the
//! decision pipeline logs failures and never waits on a retry.
//! - `InMemoryStore`: bounded store for tests and minimal deployments
//! - `SledStore`: sled database, one tree per record kind

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::{DecisionRecord, EscalationBundle};

/// Trait for pluggable persistence backends
///
/// Implementations must be thread-safe (Send + Sync) for shared access
/// across async tasks.
pub trait PersistenceStore: Send + Sync {
    fn append_decision(&self, record: &DecisionRecord) -> Result<(), PersistenceError>;

    fn append_escalation(&self, bundle: &EscalationBundle) -> Result<(), PersistenceError>;

    /// Most recent decisions, newest first
    fn recent_decisions(&self, limit: usize) -> Result<Vec<DecisionRecord>, PersistenceError>;

    /// Most recent escalations, newest first
    fn recent_escalations(&self, limit: usize) -> Result<Vec<EscalationBundle>, PersistenceError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<sled::Error> for PersistenceError {
    fn from(err: sled::Error) -> Self {
        PersistenceError::Storage(err.to_string())
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// In-memory persistence for testing and minimal deployments
///
/// Thread-safe via `RwLock`. Not durable; data is lost on restart.
pub struct InMemoryStore {
    decisions: RwLock<Vec<DecisionRecord>>,
    escalations: RwLock<Vec<EscalationBundle>>,
    max_records: usize,
}

impl InMemoryStore {
    pub fn new(max_records: usize) -> Self {
        Self {
            decisions: RwLock::new(Vec::new()),
            escalations: RwLock::new(Vec::new()),
            max_records: max_records.max(1),
        }
    }

    fn push_bounded<T: Clone>(
        &self,
        lock: &RwLock<Vec<T>>,
        item: &T,
    ) -> Result<(), PersistenceError> {
        let mut store = lock
            .write()
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;
        store.push(item.clone());
        if store.len() > self.max_records {
            store.remove(0);
        }
        Ok(())
    }

    fn newest<T: Clone>(lock: &RwLock<Vec<T>>, limit: usize) -> Result<Vec<T>, PersistenceError> {
        let store = lock
            .read()
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;
        Ok(store.iter().rev().take(limit).cloned().collect())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl PersistenceStore for InMemoryStore {
    fn append_decision(&self, record: &DecisionRecord) -> Result<(), PersistenceError> {
        self.push_bounded(&self.decisions, record)
    }

    fn append_escalation(&self, bundle: &EscalationBundle) -> Result<(), PersistenceError> {
        self.push_bounded(&self.escalations, bundle)
    }

    fn recent_decisions(&self, limit: usize) -> Result<Vec<DecisionRecord>, PersistenceError> {
        Self::newest(&self.decisions, limit)
    }

    fn recent_escalations(&self, limit: usize) -> Result<Vec<EscalationBundle>, PersistenceError> {
        Self::newest(&self.escalations, limit)
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}

// ============================================================================
// sled backend
// ============================================================================

const DECISIONS_TREE: &str = "decisions";
const ESCALATIONS_TREE: &str = "escalations";

/// sled-backed store.
///
/// Key: nanosecond timestamp (big-endian, sorts chronologically) followed by
/// a per-process sequence number so records sharing a timestamp never collide.
/// Value: JSON.
#[derive(Clone)]
pub struct SledStore {
    db: Arc<sled::Db>,
    decisions: sled::Tree,
    escalations: sled::Tree,
    seq: Arc<AtomicU64>,
}

impl SledStore {
    /// Open or create the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| PersistenceError::Storage(e.to_string()))?;
            }
        }
        let db = sled::open(path)?;
        let decisions = db.open_tree(DECISIONS_TREE)?;
        let escalations = db.open_tree(ESCALATIONS_TREE)?;
        tracing::info!(path = %path.display(), decisions = decisions.len(), "Decision store opened");
        Ok(Self {
            db: Arc::new(db),
            decisions,
            escalations,
            seq: Arc::new(AtomicU64::new(0)),
        })
    }

    fn key(&self, ts: DateTime<Utc>) -> [u8; 16] {
        let nanos = ts
            .timestamp_nanos_opt()
            .unwrap_or_else(|| ts.timestamp().saturating_mul(1_000_000_000));
        // Shift so pre-1970 timestamps still sort before later ones
        let ordered = (nanos as u64) ^ (1 << 63);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let mut key = [0u8; 16];
        key[..8].copy_from_slice(&ordered.to_be_bytes());
        key[8..].copy_from_slice(&seq.to_be_bytes());
        key
    }

    fn insert<T: Serialize>(
        &self,
        tree: &sled::Tree,
        ts: DateTime<Utc>,
        value: &T,
    ) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec(value)?;
        tree.insert(self.key(ts), bytes)?;
        Ok(())
    }

    fn newest<T: DeserializeOwned>(
        tree: &sled::Tree,
        limit: usize,
    ) -> Result<Vec<T>, PersistenceError> {
        let mut out = Vec::with_capacity(limit.min(tree.len()));
        for item in tree.iter().rev() {
            if out.len() >= limit {
                break;
            }
            let (_key, value) = item?;
            match serde_json::from_slice::<T>(&value) {
                Ok(v) => out.push(v),
                Err(e) => tracing::warn!("Skipping undecodable stored record: {}", e),
            }
        }
        Ok(out)
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), PersistenceError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn decision_count(&self) -> usize {
        self.decisions.len()
    }
}

impl PersistenceStore for SledStore {
    fn append_decision(&self, record: &DecisionRecord) -> Result<(), PersistenceError> {
        self.insert(&self.decisions, record.recorded_at, record)
    }

    fn append_escalation(&self, bundle: &EscalationBundle) -> Result<(), PersistenceError> {
        self.insert(&self.escalations, bundle.timestamp, bundle)
    }

    fn recent_decisions(&self, limit: usize) -> Result<Vec<DecisionRecord>, PersistenceError> {
        Self::newest(&self.decisions, limit)
    }

    fn recent_escalations(&self, limit: usize) -> Result<Vec<EscalationBundle>, PersistenceError> {
        Self::newest(&self.escalations, limit)
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::decision_history::test_records::record;
    use crate::types::{AgentMetrics, Priority};
    use chrono::Duration;

    fn bundle(reason: &str) -> EscalationBundle {
        EscalationBundle {
            timestamp: Utc::now(),
            reason: reason.to_string(),
            correction_attempts: 3,
            recent_decisions: vec![record(1.0, Priority::High)],
            agent_metrics: AgentMetrics::default(),
            current_sensor_data: None,
            current_prediction: None,
        }
    }

    #[test]
    fn test_in_memory_evicts_oldest() {
        let store = InMemoryStore::new(2);
        for fuel in [1.0, 2.0, 3.0] {
            store.append_decision(&record(fuel, Priority::Low)).unwrap();
        }
        let recent = store.recent_decisions(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].decision.fuel_adjustment, 3.0);
        assert_eq!(recent[1].decision.fuel_adjustment, 2.0);
        assert_eq!(store.backend_name(), "InMemory");
    }

    #[test]
    fn test_sled_round_trip_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path().join("store.db")).unwrap();

        let mut older = record(1.0, Priority::Low);
        older.recorded_at = Utc::now() - Duration::minutes(5);
        store.append_decision(&older).unwrap();
        store.append_decision(&record(2.0, Priority::Medium)).unwrap();

        let recent = store.recent_decisions(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].decision.fuel_adjustment, 2.0);
        assert_eq!(store.decision_count(), 2);

        store.append_escalation(&bundle("test")).unwrap();
        let escalations = store.recent_escalations(5).unwrap();
        assert_eq!(escalations.len(), 1);
        assert_eq!(escalations[0].reason, "test");
    }

    #[test]
    fn test_sled_same_timestamp_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path().join("store.db")).unwrap();
        let a = record(1.0, Priority::Low);
        let mut b = record(2.0, Priority::Low);
        b.recorded_at = a.recorded_at;
        store.append_decision(&a).unwrap();
        store.append_decision(&b).unwrap();
        assert_eq!(store.decision_count(), 2);
    }

    #[test]
    fn test_sled_reopen_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        {
            let store = SledStore::open(&path).unwrap();
            store.append_decision(&record(4.0, Priority::High)).unwrap();
            store.flush().unwrap();
        }
        let store = SledStore::open(&path).unwrap();
        assert_eq!(store.recent_decisions(1).unwrap()[0].decision.fuel_adjustment, 4.0);
    }
}
