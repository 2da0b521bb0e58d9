//! Kiln Agent: autonomous clinkerisation control decisions
//!
//! Turns periodic kiln telemetry into bounded fuel, air, feed and setpoint
//! adjustments, gates every proposal through safety and stability policy,
//! retries rejected proposals conservatively and escalates to a human when
//! automated correction runs out of budget.
//!
//! ## Architecture
//!
//! - **control**: sensor gate, rule-based generator, validator, self-correction, escalation
//! - **prediction**: clinker phase / quality prediction (trained or fallback)
//! - **pipeline**: `ControlAgent`, the single in-flight decision pipeline
//! - **background**: decision monitor, outcome evaluator, heartbeat, metrics rollup
//! - **integrations**: orchestrator, escalation and aggregate collaborators
//! - **storage**: decision history ring buffer and durable store

pub mod background;
pub mod config;
pub mod control;
pub mod integrations;
pub mod pipeline;
pub mod prediction;
pub mod storage;
pub mod types;

pub use config::AgentConfig;

pub use types::{
    AgentMetrics, AgentStatus, ControlDecision, DecisionRecord, EscalationBundle,
    HistoricalContext, Priority, QualityPrediction, SensorReading, SystemStatus,
};

pub use control::{
    ControlDecisionGenerator, DecisionValidator, EscalationManager, Rejection,
    SelfCorrectionController, SensorRejection, SensorValidator,
};

pub use pipeline::{ControlAgent, CycleError, CycleOutcome, CycleReport, DeliveryStatus, Verdict};

pub use prediction::{Predictor, PredictionError, QualityPredictor};

pub use storage::{DecisionHistory, PersistenceStore};
