//! Human escalation bundle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AgentMetrics, DecisionRecord, QualityPrediction, SensorReading};

/// Subset of the current reading an operator needs first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadingSnapshot {
    pub flame_temperature: f64,
    pub o2_level: f64,
    pub co_level: f64,
    pub fuel_flow_rate: f64,
}

impl From<&SensorReading> for ReadingSnapshot {
    fn from(r: &SensorReading) -> Self {
        Self {
            flame_temperature: r.flame_temperature,
            o2_level: r.o2_level,
            co_level: r.co_level,
            fuel_flow_rate: r.fuel_flow_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionSnapshot {
    pub quality_score: f64,
    pub energy_efficiency: f64,
    pub free_cao: f64,
    pub confidence: f64,
}

impl From<&QualityPrediction> for PredictionSnapshot {
    fn from(p: &QualityPrediction) -> Self {
        Self {
            quality_score: p.quality_score,
            energy_efficiency: p.energy_efficiency,
            free_cao: p.free_cao,
            confidence: p.confidence,
        }
    }
}

/// Everything handed to a human operator when automated correction gives up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationBundle {
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    /// Correction attempts at the moment of escalation
    pub correction_attempts: u32,
    pub recent_decisions: Vec<DecisionRecord>,
    pub agent_metrics: AgentMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_sensor_data: Option<ReadingSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_prediction: Option<PredictionSnapshot>,
}
