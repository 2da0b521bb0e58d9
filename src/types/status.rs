//! Agent metrics and status introspection types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DecisionRecord;
use crate::config::{SafetyLimits, ThresholdConfig};

/// Monotonic counters maintained by the decision pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMetrics {
    /// Readings handed to the pipeline
    pub messages_processed: u64,
    /// Readings rejected by the sensor validator
    pub readings_discarded: u64,
    /// Decisions accepted by the validator and dispatched
    pub decisions_made: u64,
    /// Conservative retries started
    pub corrections_attempted: u64,
    /// Hand-offs to a human operator
    pub escalations: u64,
    /// Cycles aborted by a predictor failure
    pub prediction_errors: u64,
    /// Dispatches the orchestrator did not acknowledge
    pub delivery_failures: u64,
}

impl AgentMetrics {
    /// Fraction of processed readings that produced a dispatched decision.
    pub fn decision_rate(&self) -> Option<f64> {
        if self.messages_processed == 0 {
            None
        } else {
            Some(self.decisions_made as f64 / self.messages_processed as f64)
        }
    }
}

/// Where the self-correction state machine currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "attempt", rename_all = "snake_case")]
pub enum CorrectionPhase {
    Normal,
    Correcting(u32),
}

impl std::fmt::Display for CorrectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorrectionPhase::Normal => write!(f, "Normal"),
            CorrectionPhase::Correcting(n) => write!(f, "Correcting({})", n),
        }
    }
}

/// Point-in-time copy of the correction controller's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionSnapshot {
    pub phase: CorrectionPhase,
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_decision_time: Option<DateTime<Utc>>,
}

/// Agent operational status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemStatus {
    /// Agent constructed, no reading processed yet
    Initializing,
    /// Processing telemetry normally
    Running,
    /// A rejected decision is being corrected
    Correcting,
    /// Shutdown requested, ingestion stopped
    Stopped,
}

impl std::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemStatus::Initializing => write!(f, "Initializing"),
            SystemStatus::Running => write!(f, "Running"),
            SystemStatus::Correcting => write!(f, "Correcting"),
            SystemStatus::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Health / introspection view returned by `ControlAgent::get_status`.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub agent_id: String,
    pub status: SystemStatus,
    pub uptime_secs: u64,
    pub metrics: AgentMetrics,
    pub last_decision: Option<DecisionRecord>,
    pub correction: CorrectionSnapshot,
    pub history_len: usize,
    pub thresholds: ThresholdConfig,
    pub safety_limits: SafetyLimits,
}
