//! Kiln telemetry types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::defaults::{
    DEFAULT_AVG_EFFICIENCY, DEFAULT_AVG_FLAME_TEMP, DEFAULT_AVG_QUALITY, DEFAULT_TEMP_VARIANCE,
};

/// One telemetry sample from the kiln.
///
/// Produced by the ingestion collaborator and consumed once per decision cycle.
/// Never mutated after capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Capture time (RFC 3339 on the wire)
    pub timestamp: DateTime<Utc>,

    // === Temperatures ===
    /// Burning-zone flame temperature (°C)
    pub flame_temperature: f64,
    /// Material (clinker bed) temperature (°C)
    pub material_temperature: f64,
    /// Kiln shell temperature (°C)
    pub shell_temperature: f64,

    // === Pressures ===
    /// Kiln inlet draft pressure (mmWC, negative under induced draft)
    pub draft_pressure: f64,
    /// Primary combustion-air pressure (mbar)
    pub combustion_air_pressure: f64,

    // === Gas analysis ===
    /// Exit-gas oxygen (%)
    pub o2_level: f64,
    /// Exit-gas carbon monoxide (ppm)
    pub co_level: f64,
    /// Exit-gas nitrogen oxides (ppm)
    pub nox_level: f64,

    // === Flows and drive ===
    /// Raw-meal flow (t/hr)
    pub raw_meal_flow: f64,
    /// Main burner fuel flow (kg/hr)
    pub fuel_flow_rate: f64,
    /// Kiln rotation speed (rpm)
    pub kiln_rpm: f64,
    /// Kiln feed rate (t/hr)
    pub feed_rate: f64,
}

impl SensorReading {
    /// Feature vector in the fixed order the phase models are trained on.
    pub fn features(&self) -> [f64; 12] {
        [
            self.flame_temperature,
            self.material_temperature,
            self.shell_temperature,
            self.draft_pressure,
            self.combustion_air_pressure,
            self.o2_level,
            self.co_level,
            self.nox_level,
            self.raw_meal_flow,
            self.fuel_flow_rate,
            self.kiln_rpm,
            self.feed_rate,
        ]
    }
}

/// Trailing-window aggregates used to condition the quality prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalContext {
    pub avg_flame_temp: f64,
    pub avg_efficiency: f64,
    pub avg_quality: f64,
    /// Flame-temperature standard deviation over the window
    pub temp_variance: f64,
    /// Number of samples in the window
    pub data_points: u64,
}

impl Default for HistoricalContext {
    /// Tuple returned when no aggregate data is available.
    fn default() -> Self {
        Self {
            avg_flame_temp: DEFAULT_AVG_FLAME_TEMP,
            avg_efficiency: DEFAULT_AVG_EFFICIENCY,
            avg_quality: DEFAULT_AVG_QUALITY,
            temp_variance: DEFAULT_TEMP_VARIANCE,
            data_points: 0,
        }
    }
}
