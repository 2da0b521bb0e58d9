//! Clinker phase / quality prediction types

use serde::{Deserialize, Serialize};

/// Predicted clinker mineralogy and derived scores for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityPrediction {
    /// Tricalcium silicate (%), clamped to 40-70
    pub c3s_content: f64,
    /// Dicalcium silicate (%), clamped to 10-35
    pub c2s_content: f64,
    /// Tricalcium aluminate (%), clamped to 3-15
    pub c3a_content: f64,
    /// Tetracalcium aluminoferrite (%), clamped to 5-20
    pub c4af_content: f64,
    /// Unreacted lime (%), clamped to 0-5
    pub free_cao: f64,
    /// Overall quality score (0-1)
    pub quality_score: f64,
    /// Energy efficiency score (0-1)
    pub energy_efficiency: f64,
    /// Prediction confidence (0.1-1.0 from predictors)
    pub confidence: f64,
}

/// Raw phase vector as produced by a phase model, before clamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseVector {
    pub c3s: f64,
    pub c2s: f64,
    pub c3a: f64,
    pub c4af: f64,
    pub free_cao: f64,
}

impl PhaseVector {
    /// Nominal composition of a well-burnt OPC clinker.
    pub const NOMINAL: Self = Self {
        c3s: 55.0,
        c2s: 20.0,
        c3a: 8.0,
        c4af: 10.0,
        free_cao: 1.0,
    };

    /// Clamp every phase to its physically realistic range.
    pub fn clamped(self) -> Self {
        Self {
            c3s: self.c3s.clamp(40.0, 70.0),
            c2s: self.c2s.clamp(10.0, 35.0),
            c3a: self.c3a.clamp(3.0, 15.0),
            c4af: self.c4af.clamp(5.0, 20.0),
            free_cao: self.free_cao.clamp(0.0, 5.0),
        }
    }
}
