//! Bounded in-memory decision history
//!
//! Append-only ring buffer read by the decision validator (oscillation and
//! streak windows) and by the periodic monitors. The oldest record is
//! evicted first once capacity is reached.

use std::collections::VecDeque;

use crate::types::DecisionRecord;

#[derive(Debug, Clone)]
pub struct DecisionHistory {
    records: VecDeque<DecisionRecord>,
    capacity: usize,
}

impl DecisionHistory {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a record, evicting the oldest when full.
    pub fn append(&mut self, record: DecisionRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Up to `n` most recent records, oldest first.
    pub fn last_n(&self, n: usize) -> impl DoubleEndedIterator<Item = &DecisionRecord> + ExactSizeIterator {
        let skip = self.records.len().saturating_sub(n);
        self.records.iter().skip(skip)
    }

    /// Owned copy of the `n` most recent records, oldest first.
    pub fn tail(&self, n: usize) -> Vec<DecisionRecord> {
        self.last_n(n).cloned().collect()
    }

    pub fn latest(&self) -> Option<&DecisionRecord> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for DecisionHistory {
    fn default() -> Self {
        Self::new(crate::config::defaults::DECISION_HISTORY_CAPACITY)
    }
}
