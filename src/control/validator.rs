//! Decision safety and stability gatekeeper
//!
//! Sole authority on whether a proposal may be dispatched. Checks run in
//! order and short-circuit on the first failure:
//!
//! 1. Per-channel magnitude limits and setpoint range
//! 2. Oscillation: recent fuel adjustments must share one sign
//! 3. Streak: too many HIGH decisions among recent records
//! 4. Sanity: a HIGH decision must move at least one channel meaningfully
//!
//! The history windows inspect already-dispatched records only; the
//! candidate itself is not part of them.

use crate::config::{SafetyLimits, ValidatorConfig};
use crate::storage::DecisionHistory;
use crate::types::{ControlDecision, Priority};

/// Which validator rule failed. An outcome, not an error: it triggers
/// self-correction.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    AdjustmentLimit {
        channel: &'static str,
        value: f64,
        limit: f64,
    },
    SetpointOutOfRange {
        value: f64,
        min: f64,
        max: f64,
    },
    Oscillation {
        window: usize,
    },
    HighPriorityStreak {
        count: usize,
        window: usize,
    },
    SeverityMismatch,
}

impl Rejection {
    /// Short rule name for structured logs and metrics.
    pub fn rule(&self) -> &'static str {
        match self {
            Rejection::AdjustmentLimit { .. } => "adjustment_limit",
            Rejection::SetpointOutOfRange { .. } => "setpoint_range",
            Rejection::Oscillation { .. } => "oscillation",
            Rejection::HighPriorityStreak { .. } => "high_priority_streak",
            Rejection::SeverityMismatch => "severity_mismatch",
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::AdjustmentLimit {
                channel,
                value,
                limit,
            } => write!(f, "{channel} adjustment {value:.2} exceeds limit ±{limit}"),
            Rejection::SetpointOutOfRange { value, min, max } => {
                write!(f, "setpoint {value:.1}°C outside [{min}, {max}]")
            }
            Rejection::Oscillation { window } => {
                write!(f, "fuel adjustments oscillating over last {window} decisions")
            }
            Rejection::HighPriorityStreak { count, window } => {
                write!(f, "{count} of last {window} decisions were HIGH priority")
            }
            Rejection::SeverityMismatch => {
                write!(f, "HIGH priority decision with negligible adjustments")
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DecisionValidator {
    limits: SafetyLimits,
    config: ValidatorConfig,
}

impl DecisionValidator {
    pub fn new(limits: SafetyLimits, config: ValidatorConfig) -> Self {
        Self { limits, config }
    }

    pub fn limits(&self) -> &SafetyLimits {
        &self.limits
    }

    pub fn validate(
        &self,
        decision: &ControlDecision,
        history: &DecisionHistory,
    ) -> Result<(), Rejection> {
        self.check_limits(decision)?;
        self.check_oscillation(history)?;
        self.check_streak(history)?;
        self.check_sanity(decision)
    }

    fn check_limits(&self, d: &ControlDecision) -> Result<(), Rejection> {
        let l = &self.limits;
        for (channel, value, limit) in [
            ("fuel", d.fuel_adjustment, l.max_fuel_adjustment),
            ("air", d.air_adjustment, l.max_air_adjustment),
            ("feed", d.feed_adjustment, l.max_feed_adjustment),
        ] {
            // Written so NaN is rejected
            if !(value.abs() <= limit) {
                return Err(Rejection::AdjustmentLimit {
                    channel,
                    value,
                    limit,
                });
            }
        }
        if !(l.min_temp_setpoint..=l.max_temp_setpoint).contains(&d.temp_setpoint) {
            return Err(Rejection::SetpointOutOfRange {
                value: d.temp_setpoint,
                min: l.min_temp_setpoint,
                max: l.max_temp_setpoint,
            });
        }
        Ok(())
    }

    fn check_oscillation(&self, history: &DecisionHistory) -> Result<(), Rejection> {
        let window = self.config.oscillation_window;
        if history.len() < window {
            return Ok(());
        }
        let mut signs = history
            .last_n(window)
            .map(|r| sign(r.decision.fuel_adjustment));
        let first = signs.next();
        if signs.any(|s| Some(s) != first) {
            return Err(Rejection::Oscillation { window });
        }
        Ok(())
    }

    fn check_streak(&self, history: &DecisionHistory) -> Result<(), Rejection> {
        let window = self.config.streak_window;
        let count = history
            .last_n(window)
            .filter(|r| r.decision.priority == Priority::High)
            .count();
        if count >= self.config.streak_max_high {
            return Err(Rejection::HighPriorityStreak { count, window });
        }
        Ok(())
    }

    fn check_sanity(&self, d: &ControlDecision) -> Result<(), Rejection> {
        let floor = self.config.min_meaningful_adjustment;
        if d.priority == Priority::High && d.adjustments().iter().all(|a| a.abs() < floor) {
            return Err(Rejection::SeverityMismatch);
        }
        Ok(())
    }
}

/// -1, 0 or 1; zero is its own sign.
fn sign(v: f64) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}
