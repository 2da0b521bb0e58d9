//! Clinker Quality Prediction
//!
//! Maps one telemetry sample plus historical context to a
//! [`QualityPrediction`]. Two variants are selected at construction time:
//!
//! - **Trained**: a [`PhaseModel`] fed standardised features; its ensemble
//!   variance (if reported) feeds the confidence score
//! - **Fallback**: nominal clinker composition, used when no model is available
//!
//! Both variants clamp phases to their physical ranges and share the scoring
//! functions in [`scoring`].

pub mod scaler;
pub mod scoring;

use async_trait::async_trait;

use crate::config::PredictorConfig;
use crate::types::{HistoricalContext, PhaseVector, QualityPrediction, SensorReading};

pub use scaler::{FeatureScaler, FEATURE_COUNT};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum PredictionError {
    #[error("phase model failed: {0}")]
    Model(String),

    #[error("phase model returned non-finite output for {0}")]
    NonFinite(&'static str),

    #[error("prediction backend unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// Traits
// ============================================================================

/// Maps (reading, context) to a clamped quality prediction.
///
/// Errors abort the decision cycle; no partial decision is produced.
#[async_trait]
pub trait QualityPredictor: Send + Sync {
    async fn predict(
        &self,
        reading: &SensorReading,
        context: &HistoricalContext,
    ) -> Result<QualityPrediction, PredictionError>;

    /// Variant name for logging
    fn name(&self) -> &'static str;
}

/// Raw output of a phase model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseEstimate {
    pub phases: PhaseVector,
    /// Mean variance across ensemble members, when the model is an ensemble
    pub variance: Option<f64>,
}

/// A fitted regressor from standardised features to the five clinker phases.
pub trait PhaseModel: Send + Sync {
    fn estimate(&self, features: &[f64; FEATURE_COUNT]) -> Result<PhaseEstimate, PredictionError>;
}

// ============================================================================
// Variants
// ============================================================================

/// Predictor backed by a fitted phase model.
pub struct TrainedPredictor {
    scaler: FeatureScaler,
    model: Box<dyn PhaseModel>,
    config: PredictorConfig,
}

impl TrainedPredictor {
    pub fn new(scaler: FeatureScaler, model: Box<dyn PhaseModel>, config: PredictorConfig) -> Self {
        Self {
            scaler,
            model,
            config,
        }
    }

    fn predict_sync(
        &self,
        reading: &SensorReading,
        context: &HistoricalContext,
    ) -> Result<QualityPrediction, PredictionError> {
        let features = self.scaler.transform_reading(reading);
        let estimate = self.model.estimate(&features)?;
        check_finite(&estimate.phases)?;
        Ok(assemble(
            estimate.phases,
            reading,
            context,
            estimate.variance,
            &self.config,
        ))
    }
}

/// Predictor used when no trained model is available.
#[derive(Debug, Clone, Default)]
pub struct FallbackPredictor {
    config: PredictorConfig,
}

impl FallbackPredictor {
    pub fn new(config: PredictorConfig) -> Self {
        Self { config }
    }

    fn predict_sync(&self, reading: &SensorReading, context: &HistoricalContext) -> QualityPrediction {
        assemble(PhaseVector::NOMINAL, reading, context, None, &self.config)
    }
}

/// Predictor variant chosen at construction time.
pub enum Predictor {
    Trained(TrainedPredictor),
    Fallback(FallbackPredictor),
}

impl Predictor {
    /// Trained variant when a model is supplied, fallback otherwise.
    pub fn from_model(model: Option<Box<dyn PhaseModel>>, config: PredictorConfig) -> Self {
        match model {
            Some(model) => {
                Self::Trained(TrainedPredictor::new(FeatureScaler::typical(), model, config))
            }
            None => {
                tracing::warn!("No trained phase model available, using fallback predictor");
                Self::Fallback(FallbackPredictor::new(config))
            }
        }
    }
}

#[async_trait]
impl QualityPredictor for Predictor {
    async fn predict(
        &self,
        reading: &SensorReading,
        context: &HistoricalContext,
    ) -> Result<QualityPrediction, PredictionError> {
        match self {
            Predictor::Trained(p) => p.predict_sync(reading, context),
            Predictor::Fallback(p) => Ok(p.predict_sync(reading, context)),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Predictor::Trained(_) => "trained",
            Predictor::Fallback(_) => "fallback",
        }
    }
}

fn check_finite(phases: &PhaseVector) -> Result<(), PredictionError> {
    for (name, v) in [
        ("c3s", phases.c3s),
        ("c2s", phases.c2s),
        ("c3a", phases.c3a),
        ("c4af", phases.c4af),
        ("free_cao", phases.free_cao),
    ] {
        if !v.is_finite() {
            return Err(PredictionError::NonFinite(name));
        }
    }
    Ok(())
}

fn assemble(
    raw: PhaseVector,
    reading: &SensorReading,
    context: &HistoricalContext,
    variance: Option<f64>,
    config: &PredictorConfig,
) -> QualityPrediction {
    let phases = raw.clamped();
    QualityPrediction {
        c3s_content: phases.c3s,
        c2s_content: phases.c2s,
        c3a_content: phases.c3a,
        c4af_content: phases.c4af,
        free_cao: phases.free_cao,
        quality_score: scoring::quality_score(&phases),
        energy_efficiency: scoring::energy_efficiency(reading),
        confidence: scoring::confidence(context, variance, config),
    }
}
