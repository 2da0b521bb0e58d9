//! Clinker quality, energy-efficiency and confidence scoring
//!
//! Pure functions shared by every predictor variant. Closeness factors are
//! `1 - min(1, |x - target| / tolerance)`, so each lies in [0, 1].

use crate::config::PredictorConfig;
use crate::types::{HistoricalContext, PhaseVector, SensorReading};

// ============================================================================
// Targets
// ============================================================================

const C3S_TARGET: f64 = 55.0;
const C3S_TOLERANCE: f64 = 15.0;
const C2S_TARGET: f64 = 20.0;
const C2S_TOLERANCE: f64 = 10.0;
const C3A_TARGET: f64 = 8.0;
const C3A_TOLERANCE: f64 = 4.0;
const C4AF_TARGET: f64 = 10.0;
const C4AF_TOLERANCE: f64 = 4.0;

/// Free lime at or below this earns full credit (%)
const FREE_CAO_FULL_CREDIT: f64 = 1.0;
/// Linear loss region ends here (%)
const FREE_CAO_LINEAR_LIMIT: f64 = 2.0;

const OPTIMAL_FUEL_RATE: f64 = 50.0;
const OPTIMAL_FLAME_TEMP: f64 = 1450.0;
const OPTIMAL_O2: f64 = 3.0;
const OPTIMAL_FEED_RATE: f64 = 120.0;

/// CO ppm that costs one unit of efficiency
const CO_PENALTY_SCALE: f64 = 500.0;
const CO_PENALTY_CAP: f64 = 0.2;

fn closeness(value: f64, target: f64, tolerance: f64) -> f64 {
    1.0 - ((value - target).abs() / tolerance).min(1.0)
}

/// Free-lime factor: full credit up to 1%, linear loss to 2%, then a
/// half-slope penalty measured from 1%.
pub fn free_cao_factor(free_cao: f64) -> f64 {
    if free_cao <= FREE_CAO_FULL_CREDIT {
        1.0
    } else if free_cao <= FREE_CAO_LINEAR_LIMIT {
        1.0 - (free_cao - FREE_CAO_FULL_CREDIT)
    } else {
        (1.0 - (free_cao - FREE_CAO_FULL_CREDIT) * 0.5).max(0.0)
    }
}

/// Overall quality score in [0, 1].
///
/// Mean of the four phase factors and the free-lime factor, with free lime
/// counted at double weight inside the mean.
pub fn quality_score(phases: &PhaseVector) -> f64 {
    let factors = [
        closeness(phases.c3s, C3S_TARGET, C3S_TOLERANCE),
        closeness(phases.c2s, C2S_TARGET, C2S_TOLERANCE),
        closeness(phases.c3a, C3A_TARGET, C3A_TOLERANCE),
        closeness(phases.c4af, C4AF_TARGET, C4AF_TOLERANCE),
        free_cao_factor(phases.free_cao) * 2.0,
    ];
    let mean = factors.iter().sum::<f64>() / factors.len() as f64;
    mean.clamp(0.0, 1.0)
}

/// Energy efficiency in [0, 1] from current operating conditions.
pub fn energy_efficiency(reading: &SensorReading) -> f64 {
    let factors = [
        closeness(reading.fuel_flow_rate, OPTIMAL_FUEL_RATE, OPTIMAL_FUEL_RATE),
        closeness(reading.flame_temperature, OPTIMAL_FLAME_TEMP, OPTIMAL_FLAME_TEMP),
        closeness(reading.o2_level, OPTIMAL_O2, OPTIMAL_O2),
        closeness(reading.feed_rate, OPTIMAL_FEED_RATE, OPTIMAL_FEED_RATE),
    ];
    let co_penalty = (reading.co_level / CO_PENALTY_SCALE).min(CO_PENALTY_CAP);
    let mean = factors.iter().sum::<f64>() / factors.len() as f64;
    (mean - co_penalty).clamp(0.0, 1.0)
}

/// Contribution of a model's ensemble variance to confidence.
pub fn model_uncertainty_term(variance: f64) -> f64 {
    (0.1 - 0.01 * variance).max(-0.2)
}

/// Prediction confidence from data availability, process stability, and an
/// optional model-uncertainty term, clamped to the configured range.
pub fn confidence(
    context: &HistoricalContext,
    model_variance: Option<f64>,
    config: &PredictorConfig,
) -> f64 {
    let data_term = match context.data_points {
        n if n > 50 => 0.1,
        n if n > 20 => 0.05,
        _ => -0.1,
    };

    let stability_term = if context.temp_variance < 5.0 {
        0.1
    } else if context.temp_variance > 20.0 {
        -0.1
    } else {
        0.0
    };

    let model_term = model_variance
        .filter(|v| v.is_finite())
        .map_or(0.0, model_uncertainty_term);

    (config.base_confidence + data_term + stability_term + model_term)
        .clamp(config.min_confidence, config.max_confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::nominal_reading;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_nominal_phases_score_full_quality() {
        assert!(approx(quality_score(&PhaseVector::NOMINAL), 1.0));
    }

    #[test]
    fn test_free_cao_factor_regions() {
        assert!(approx(free_cao_factor(0.4), 1.0));
        assert!(approx(free_cao_factor(1.5), 0.5));
        assert!(approx(free_cao_factor(2.0), 0.0));
        assert!(approx(free_cao_factor(3.0), 0.0));
        assert!(approx(free_cao_factor(2.5), 0.25));
    }

    #[test]
    fn test_quality_drops_with_off_target_phases() {
        let phases = PhaseVector {
            c3s: 47.5,
            c2s: 20.0,
            c3a: 8.0,
            c4af: 10.0,
            free_cao: 2.0,
        };
        // (0.5 + 1 + 1 + 1 + 0) / 5
        assert!(approx(quality_score(&phases), 0.7));
    }

    #[test]
    fn test_energy_efficiency_nominal() {
        let r = nominal_reading();
        // fuel 0.9, temp 1.0, o2 0.8333, feed 1.0, co penalty 0.06
        let expected = (0.9 + 1.0 + (1.0 - 0.5 / 3.0) + 1.0) / 4.0 - 0.06;
        assert!(approx(energy_efficiency(&r), expected));
    }

    #[test]
    fn test_co_penalty_is_capped() {
        let mut r = nominal_reading();
        r.co_level = 900.0;
        let mut clean = nominal_reading();
        clean.co_level = 0.0;
        assert!(approx(energy_efficiency(&clean) - energy_efficiency(&r), 0.2));
    }

    #[test]
    fn test_confidence_terms() {
        let cfg = PredictorConfig::default();
        let ctx = HistoricalContext::default();
        // 0.8 - 0.1 (no data) + 0.0 (variance 10)
        assert!(approx(confidence(&ctx, None, &cfg), 0.7));

        let rich = HistoricalContext {
            data_points: 60,
            temp_variance: 3.0,
            ..HistoricalContext::default()
        };
        assert!(approx(confidence(&rich, None, &cfg), 1.0));

        let medium = HistoricalContext {
            data_points: 30,
            temp_variance: 25.0,
            ..HistoricalContext::default()
        };
        assert!(approx(confidence(&medium, None, &cfg), 0.75));
    }

    #[test]
    fn test_model_term_and_clamp() {
        assert!(approx(model_uncertainty_term(0.0), 0.1));
        assert!(approx(model_uncertainty_term(50.0), -0.2));

        let cfg = PredictorConfig {
            base_confidence: 0.1,
            ..PredictorConfig::default()
        };
        let unstable = HistoricalContext {
            temp_variance: 40.0,
            ..HistoricalContext::default()
        };
        assert!(approx(confidence(&unstable, Some(100.0), &cfg), 0.1));
    }
}
