//! Control decision types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{QualityPrediction, SensorReading};

/// Urgency of a control decision. Ordered so that `High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "LOW"),
            Priority::Medium => write!(f, "MEDIUM"),
            Priority::High => write!(f, "HIGH"),
        }
    }
}

/// A bounded adjustment proposal for the kiln.
///
/// Adjustments are signed deltas in physical units; the setpoint is absolute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlDecision {
    /// Fuel flow change (kg/hr)
    pub fuel_adjustment: f64,
    /// Combustion air flow change (m³/min)
    pub air_adjustment: f64,
    /// Feed rate change (t/hr)
    pub feed_adjustment: f64,
    /// Absolute burning-zone temperature setpoint (°C)
    pub temp_setpoint: f64,
    pub priority: Priority,
    /// Triggered rules, in evaluation order
    pub reasoning: Vec<String>,
}

impl ControlDecision {
    /// Human-readable reasoning trace.
    pub fn reasoning_text(&self) -> String {
        self.reasoning.join("; ")
    }

    /// The three adjustment deltas as (fuel, air, feed).
    pub fn adjustments(&self) -> [f64; 3] {
        [self.fuel_adjustment, self.air_adjustment, self.feed_adjustment]
    }
}

/// A dispatched decision together with the inputs that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub recorded_at: DateTime<Utc>,
    pub reading: SensorReading,
    pub prediction: QualityPrediction,
    pub decision: ControlDecision,
    /// 0 for a first-pass decision, n for the n-th conservative retry
    pub correction_attempt: u32,
}
