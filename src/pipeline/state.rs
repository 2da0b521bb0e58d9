//! Shared agent state
//!
//! Written by the decision pipeline, read by the periodic monitors and the
//! status endpoint. Wrapped in `Arc<tokio::sync::RwLock<_>>`; holders never
//! keep the guard across an `.await`.

use std::collections::VecDeque;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::control::CorrectionState;
use crate::storage::DecisionHistory;
use crate::types::{AgentMetrics, SystemStatus};

#[derive(Debug, Clone)]
pub struct AgentState {
    pub started: Instant,
    pub status: SystemStatus,
    pub history: DecisionHistory,
    pub correction: CorrectionState,
    pub metrics: AgentMetrics,
    /// Set on dispatch, cleared once the decision monitor has evaluated it
    pub pending_evaluation: Option<DateTime<Utc>>,
    /// Outcome of recent cycles, `true` for a prediction failure
    recent_cycles: VecDeque<bool>,
    cycle_window: usize,
}

impl AgentState {
    pub fn new(history_capacity: usize, cycle_window: usize) -> Self {
        let cycle_window = cycle_window.max(1);
        Self {
            started: Instant::now(),
            status: SystemStatus::Initializing,
            history: DecisionHistory::new(history_capacity),
            correction: CorrectionState::default(),
            metrics: AgentMetrics::default(),
            pending_evaluation: None,
            recent_cycles: VecDeque::with_capacity(cycle_window),
            cycle_window,
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Track whether a cycle failed in prediction. Returns the failure count
    /// within the window.
    pub fn record_cycle(&mut self, failed: bool) -> usize {
        if self.recent_cycles.len() == self.cycle_window {
            self.recent_cycles.pop_front();
        }
        self.recent_cycles.push_back(failed);
        self.recent_failures()
    }

    pub fn recent_failures(&self) -> usize {
        self.recent_cycles.iter().filter(|f| **f).count()
    }

    /// Forget cycle outcomes after the failures have been escalated.
    pub fn clear_cycle_window(&mut self) {
        self.recent_cycles.clear();
    }
}

impl Default for AgentState {
    fn default() -> Self {
        Self::new(
            crate::config::defaults::DECISION_HISTORY_CAPACITY,
            crate::config::defaults::PROCESSING_ERROR_WINDOW,
        )
    }
}
