//! Rule-based control decision generator
//!
//! Rules run in a fixed order; each may set adjustments and append to the
//! reasoning trace:
//!
//! 1. Free CaO above ceiling: raise setpoint, cut feed (HIGH)
//! 2. Flame temperature outside band: fuel correction
//! 3. O2 outside band: air correction (HIGH when lean)
//! 4. CO above ceiling: air correction unless already set (HIGH)
//! 5. Low energy efficiency: small fuel nudge, only when nothing else fired
//! 6. Low quality score: small feed cut when nothing else fired (always HIGH)
//! 7. Stability guard: large fuel/air deltas force HIGH
//!
//! Finally fuel/air/feed deltas are scaled by prediction confidence. The
//! setpoint is absolute and never scaled.

use crate::config::ThresholdConfig;
use crate::types::{ControlDecision, Priority, QualityPrediction, SensorReading};

/// Reasoning used when no rule fires.
pub const OPTIMAL_OPERATION: &str = "optimal operation — no adjustment needed";

// Rule gains and caps
const FREE_CAO_SETPOINT_GAIN: f64 = 8.0;
const FREE_CAO_SETPOINT_CAP: f64 = 20.0;
const FREE_CAO_FEED_GAIN: f64 = 0.3;
const FREE_CAO_FEED_FLOOR: f64 = -2.0;

const TEMP_FUEL_GAIN: f64 = 0.1;
const TEMP_FUEL_CAP: f64 = 5.0;

const O2_AIR_GAIN: f64 = 2.0;
const O2_EXCESS_AIR_FLOOR: f64 = -10.0;
const O2_LEAN_AIR_CAP: f64 = 8.0;

const CO_AIR_GAIN: f64 = 0.05;
const CO_AIR_CAP: f64 = 5.0;

const EFFICIENCY_FUEL_NUDGE: f64 = 0.5;
const EFFICIENCY_REFERENCE_FUEL: f64 = 50.0;

const QUALITY_FEED_STEP: f64 = 0.3;
const QUALITY_FEED_FLOOR: f64 = -1.0;

const STABILITY_FUEL_LIMIT: f64 = 3.0;
const STABILITY_AIR_LIMIT: f64 = 8.0;

#[derive(Debug, Clone, Default)]
pub struct ControlDecisionGenerator {
    thresholds: ThresholdConfig,
}

impl ControlDecisionGenerator {
    pub fn new(thresholds: ThresholdConfig) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Deterministic decision for one cycle.
    pub fn generate(&self, reading: &SensorReading, prediction: &QualityPrediction) -> ControlDecision {
        let t = &self.thresholds;
        let mut fuel = 0.0_f64;
        let mut air = 0.0_f64;
        let mut feed = 0.0_f64;
        let mut setpoint = reading.flame_temperature;
        let mut priority = Priority::Medium;
        let mut reasoning: Vec<String> = Vec::new();

        // 1. Free lime
        if prediction.free_cao > t.max_free_cao {
            let raise = ((prediction.free_cao - t.max_free_cao) * FREE_CAO_SETPOINT_GAIN)
                .min(FREE_CAO_SETPOINT_CAP);
            setpoint += raise;
            feed = (-FREE_CAO_FEED_GAIN * prediction.free_cao).max(FREE_CAO_FEED_FLOOR);
            priority = Priority::High;
            reasoning.push(format!(
                "High free CaO ({:.2}%): raising setpoint by {:.1}°C and reducing feed",
                prediction.free_cao, raise
            ));
        }

        // 2. Flame temperature band
        if reading.flame_temperature < t.min_flame_temp {
            fuel = ((t.min_flame_temp - reading.flame_temperature) * TEMP_FUEL_GAIN).min(TEMP_FUEL_CAP);
            if priority != Priority::High {
                priority = Priority::Medium;
            }
            reasoning.push(format!(
                "Low flame temperature ({:.0}°C): increasing fuel by {:.1} kg/hr",
                reading.flame_temperature, fuel
            ));
        } else if reading.flame_temperature > t.max_flame_temp {
            fuel = ((t.max_flame_temp - reading.flame_temperature) * TEMP_FUEL_GAIN).max(-TEMP_FUEL_CAP);
            reasoning.push(format!(
                "High flame temperature ({:.0}°C): reducing fuel by {:.1} kg/hr",
                reading.flame_temperature,
                fuel.abs()
            ));
        }

        // 3. Oxygen band
        if reading.o2_level > t.max_o2 {
            air = ((t.max_o2 - reading.o2_level) * O2_AIR_GAIN).max(O2_EXCESS_AIR_FLOOR);
            reasoning.push(format!(
                "Excess air (O2 {:.1}%): reducing air flow by {:.1} m³/min",
                reading.o2_level,
                air.abs()
            ));
        } else if reading.o2_level < t.min_o2 {
            air = ((t.min_o2 - reading.o2_level) * O2_AIR_GAIN).min(O2_LEAN_AIR_CAP);
            priority = Priority::High;
            reasoning.push(format!(
                "Insufficient air (O2 {:.1}%): increasing air flow by {:.1} m³/min",
                reading.o2_level, air
            ));
        }

        // 4. CO ceiling; an O2-driven air correction takes precedence
        if reading.co_level > t.max_co {
            if air == 0.0 {
                air = ((reading.co_level - t.max_co) * CO_AIR_GAIN).min(CO_AIR_CAP);
            }
            priority = Priority::High;
            reasoning.push(format!("High CO ({:.0} ppm): incomplete combustion", reading.co_level));
        }

        // 5. Energy efficiency, only when the process is otherwise on target
        if prediction.energy_efficiency < t.min_energy_efficiency && reasoning.is_empty() {
            if fuel.abs() < 1.0 {
                fuel += if reading.fuel_flow_rate > EFFICIENCY_REFERENCE_FUEL {
                    -EFFICIENCY_FUEL_NUDGE
                } else {
                    EFFICIENCY_FUEL_NUDGE
                };
            }
            reasoning.push(format!(
                "Low energy efficiency ({:.2}): trimming fuel rate",
                prediction.energy_efficiency
            ));
        }

        // 6. Quality score
        if prediction.quality_score < t.min_quality_score {
            if reasoning.is_empty() {
                feed = (feed - QUALITY_FEED_STEP).max(QUALITY_FEED_FLOOR);
                reasoning.push(format!(
                    "Low quality score ({:.2}): reducing feed rate",
                    prediction.quality_score
                ));
            }
            priority = Priority::High;
        }

        // 7. Stability guard
        if fuel.abs() > STABILITY_FUEL_LIMIT || air.abs() > STABILITY_AIR_LIMIT {
            priority = Priority::High;
            reasoning.push("Large adjustments required: monitoring closely".to_string());
        }

        if reasoning.is_empty() {
            reasoning.push(OPTIMAL_OPERATION.to_string());
        }

        let c = prediction.confidence;
        ControlDecision {
            fuel_adjustment: fuel * c,
            air_adjustment: air * c,
            feed_adjustment: feed * c,
            temp_setpoint: setpoint,
            priority,
            reasoning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::decision_history::test_records::prediction;
    use crate::types::fixtures::nominal_reading;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn full_confidence() -> QualityPrediction {
        QualityPrediction {
            confidence: 1.0,
            ..prediction()
        }
    }

    #[test]
    fn test_nominal_is_optimal_operation() {
        let g = ControlDecisionGenerator::default();
        let d = g.generate(&nominal_reading(), &prediction());
        assert_eq!(d.reasoning, vec![OPTIMAL_OPERATION.to_string()]);
        assert_eq!(d.priority, Priority::Medium);
        assert_eq!(d.adjustments(), [0.0, 0.0, 0.0]);
        assert_eq!(d.temp_setpoint, 1450.0);
    }

    #[test]
    fn test_high_free_cao() {
        let g = ControlDecisionGenerator::default();
        let p = QualityPrediction {
            free_cao: 2.3,
            ..full_confidence()
        };
        let d = g.generate(&nominal_reading(), &p);
        assert!(approx(d.temp_setpoint, 1452.4));
        assert!(approx(d.feed_adjustment, -0.69));
        assert_eq!(d.priority, Priority::High);
    }

    #[test]
    fn test_free_cao_setpoint_and_feed_caps() {
        let g = ControlDecisionGenerator::default();
        let p = QualityPrediction {
            free_cao: 5.0,
            ..full_confidence()
        };
        let d = g.generate(&nominal_reading(), &p);
        assert!(approx(d.temp_setpoint, 1470.0));
        // -0.3 * 5 = -1.5 stays above the -2.0 floor
        assert!(approx(d.feed_adjustment, -1.5));
    }

    #[test]
    fn test_lean_combustion_is_high_priority() {
        let g = ControlDecisionGenerator::default();
        let mut r = nominal_reading();
        r.o2_level = 1.5;
        let d = g.generate(&r, &full_confidence());
        assert!(approx(d.air_adjustment, 1.0));
        assert_eq!(d.priority, Priority::High);
    }

    #[test]
    fn test_excess_air_keeps_medium() {
        let g = ControlDecisionGenerator::default();
        let mut r = nominal_reading();
        r.o2_level = 5.0;
        let d = g.generate(&r, &full_confidence());
        assert!(approx(d.air_adjustment, -2.0));
        assert_eq!(d.priority, Priority::Medium);
    }

    #[test]
    fn test_temperature_band_fuel_corrections() {
        let g = ControlDecisionGenerator::default();
        let mut r = nominal_reading();
        r.flame_temperature = 1380.0;
        let d = g.generate(&r, &full_confidence());
        assert!(approx(d.fuel_adjustment, 2.0));
        assert_eq!(d.priority, Priority::Medium);

        r.flame_temperature = 1600.0;
        let d = g.generate(&r, &full_confidence());
        // capped at -5, which trips the stability guard
        assert!(approx(d.fuel_adjustment, -5.0));
        assert_eq!(d.priority, Priority::High);
        assert!(d.reasoning.last().unwrap().contains("monitoring closely"));
    }

    #[test]
    fn test_co_does_not_override_o2_air() {
        let g = ControlDecisionGenerator::default();
        let mut r = nominal_reading();
        r.o2_level = 5.0;
        r.co_level = 300.0;
        let d = g.generate(&r, &full_confidence());
        assert!(approx(d.air_adjustment, -2.0));
        assert_eq!(d.priority, Priority::High);

        r.o2_level = 3.0;
        let d = g.generate(&r, &full_confidence());
        assert!(approx(d.air_adjustment, 5.0));
    }

    #[test]
    fn test_efficiency_nudge_only_when_quiet() {
        let g = ControlDecisionGenerator::default();
        let p = QualityPrediction {
            energy_efficiency: 0.6,
            ..full_confidence()
        };
        let mut r = nominal_reading();
        r.fuel_flow_rate = 60.0;
        let d = g.generate(&r, &p);
        assert!(approx(d.fuel_adjustment, -0.5));
        assert_eq!(d.priority, Priority::Medium);

        r.fuel_flow_rate = 40.0;
        assert!(approx(g.generate(&r, &p).fuel_adjustment, 0.5));

        r.o2_level = 5.0;
        let d = g.generate(&r, &p);
        assert!(approx(d.fuel_adjustment, 0.0));
        assert_eq!(d.reasoning.len(), 1);
    }

    #[test]
    fn test_low_quality_raises_priority_even_when_other_rules_fired() {
        let g = ControlDecisionGenerator::default();
        let p = QualityPrediction {
            quality_score: 0.6,
            ..full_confidence()
        };
        let d = g.generate(&nominal_reading(), &p);
        assert!(approx(d.feed_adjustment, -0.3));
        assert_eq!(d.priority, Priority::High);

        let mut r = nominal_reading();
        r.o2_level = 5.0;
        let d = g.generate(&r, &p);
        assert!(approx(d.feed_adjustment, 0.0));
        assert_eq!(d.priority, Priority::High);
    }

    #[test]
    fn test_confidence_scales_deltas_not_setpoint() {
        let g = ControlDecisionGenerator::default();
        let mut r = nominal_reading();
        r.o2_level = 1.5;
        let p = QualityPrediction {
            free_cao: 2.3,
            confidence: 0.5,
            ..prediction()
        };
        let d = g.generate(&r, &p);
        assert!(approx(d.air_adjustment, 0.5));
        assert!(approx(d.feed_adjustment, -0.345));
        assert!(approx(d.temp_setpoint, 1452.4));
    }

    /// Across the on-target operating domain nothing is urgent. The optimal
    /// message additionally needs the efficiency and quality floors met.
    #[tokio::test]
    async fn test_on_target_domain_never_high() {
        use crate::config::PredictorConfig;
        use crate::prediction::{FallbackPredictor, Predictor, QualityPredictor};
        use crate::types::HistoricalContext;

        let g = ControlDecisionGenerator::default();
        let predictor = Predictor::Fallback(FallbackPredictor::new(PredictorConfig::default()));
        let context = HistoricalContext::default();
        let (mut optimal, mut trimmed) = (0, 0);

        for flame in [1400.0, 1425.0, 1450.0, 1475.0, 1500.0] {
            for o2 in [2.0, 2.5, 3.0, 3.5, 4.0] {
                for co in [0.0, 50.0, 100.0] {
                    for fuel_rate in [20.0, 50.0, 100.0, 150.0, 200.0] {
                        for feed_rate in [60.0, 120.0, 180.0] {
                            let r = SensorReading {
                                flame_temperature: flame,
                                o2_level: o2,
                                co_level: co,
                                fuel_flow_rate: fuel_rate,
                                feed_rate,
                                ..nominal_reading()
                            };
                            let p = predictor.predict(&r, &context).await.unwrap();
                            assert!(p.free_cao <= 2.0);
                            let d = g.generate(&r, &p);

                            assert_ne!(d.priority, Priority::High, "{r:?}");
                            assert_eq!(d.temp_setpoint, flame);
                            if p.energy_efficiency >= 0.75 && p.quality_score >= 0.85 {
                                assert_eq!(d.reasoning_text(), OPTIMAL_OPERATION, "{r:?}");
                                optimal += 1;
                            } else {
                                assert_eq!(d.reasoning.len(), 1);
                                assert!(d.fuel_adjustment.abs() <= 0.5);
                                trimmed += 1;
                            }
                        }
                    }
                }
            }
        }
        // both branches of the domain are exercised
        assert!(optimal > 0 && trimmed > 0);
    }
}
