//! External Collaborators
//!
//! Narrow contracts the decision core consumes, plus the implementations
//! shipped with the agent:
//!
//! - [`OrchestratorClient`]: receives dispatched decisions (`HttpOrchestratorClient`)
//! - [`EscalationChannel`]: notifies a human operator (`HttpEscalationChannel`)
//! - [`HistoricalContextProvider`] / [`AggregateSource`]: trailing-window
//!   statistics (`TelemetryWindow`, fed through [`TelemetrySink`])

pub mod escalation_channel;
pub mod orchestrator;
pub mod telemetry_window;

pub use escalation_channel::{AlertPayload, HttpEscalationChannel};
pub use orchestrator::{DecisionPayload, HttpOrchestratorClient};
pub use telemetry_window::TelemetryWindow;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{
    ControlDecision, EscalationBundle, HistoricalContext, QualityPrediction, SensorReading,
};

// ============================================================================
// Error Types
// ============================================================================

/// Orchestrator / escalation delivery failure. Logged, never retried mid-cycle.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned status {0}")]
    ServerError(reqwest::StatusCode),
    #[error("timed out after {0}s")]
    Timeout(u64),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("endpoint unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AggregateError {
    #[error("no samples in the requested window")]
    NoData,
    #[error("aggregate backend error: {0}")]
    Backend(String),
}

// ============================================================================
// Data
// ============================================================================

/// Everything the orchestrator needs about one dispatched decision.
#[derive(Debug, Clone, Copy)]
pub struct DecisionDispatch<'a> {
    pub agent_id: &'a str,
    pub decision: &'a ControlDecision,
    pub reading: &'a SensorReading,
    pub prediction: &'a QualityPrediction,
    pub correction_attempt: u32,
}

/// Orchestrator acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorAck {
    /// Free-form operator or optimiser feedback, logged when present
    #[serde(default)]
    pub feedback: Option<serde_json::Value>,
}

/// Process aggregates over a short trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowAggregate {
    pub avg_quality: f64,
    pub avg_efficiency: f64,
    /// Flame-temperature standard deviation (°C)
    pub temp_stddev: f64,
    pub samples: u64,
}

// ============================================================================
// Traits
// ============================================================================

#[async_trait]
pub trait OrchestratorClient: Send + Sync {
    async fn send_decision(
        &self,
        dispatch: DecisionDispatch<'_>,
    ) -> Result<OrchestratorAck, TransportError>;

    /// Target description for logging
    fn endpoint(&self) -> &str;
}

#[async_trait]
pub trait EscalationChannel: Send + Sync {
    async fn notify(&self, agent_id: &str, bundle: &EscalationBundle) -> Result<(), TransportError>;

    fn endpoint(&self) -> &str;
}

/// Trailing-window context for the predictor. Never fails: the documented
/// default tuple is returned when no data is available.
#[async_trait]
pub trait HistoricalContextProvider: Send + Sync {
    async fn historical_context(&self) -> HistoricalContext;
}

/// Short-window process aggregates for outcome evaluation.
#[async_trait]
pub trait AggregateSource: Send + Sync {
    async fn window_aggregate(
        &self,
        window: chrono::Duration,
    ) -> Result<WindowAggregate, AggregateError>;
}

/// Receives every (reading, prediction) pair the pipeline produces.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, reading: &SensorReading, prediction: &QualityPrediction);
}

/// Context provider that always returns the same tuple.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticContextProvider(pub HistoricalContext);

#[async_trait]
impl HistoricalContextProvider for StaticContextProvider {
    async fn historical_context(&self) -> HistoricalContext {
        self.0
    }
}
