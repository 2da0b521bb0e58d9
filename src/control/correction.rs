//! Self-correction state machine
//!
//! ```text
//! Normal ──reject──▶ Correcting(1) ──reject──▶ Correcting(2) ──▶ … Correcting(max)
//!    ▲                    │accept                                      │reject
//!    └────────────────────┴───────────────◀── escalate + reset ◀────────┘
//! ```
//!
//! One conservative retry is made per rejected cycle. A rejection arriving
//! with the budget spent escalates instead of retrying. Any accepted decision,
//! an escalation, or 15 minutes without a decision resets the counter.
//!
//! The controller is pure; the pipeline owns the [`CorrectionState`] and
//! performs the backoff sleep.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::CorrectionConfig;
use crate::types::{ControlDecision, CorrectionPhase, CorrectionSnapshot, Priority, SensorReading};

/// Escalation reason when the retry budget is exhausted.
pub const MAX_ATTEMPTS_EXCEEDED: &str = "maximum self-correction attempts exceeded";

/// Attempt counter and last-activity time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrectionState {
    attempts: u32,
    last_decision_time: Option<DateTime<Utc>>,
}

impl CorrectionState {
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_decision_time(&self) -> Option<DateTime<Utc>> {
        self.last_decision_time
    }

    pub fn phase(&self) -> CorrectionPhase {
        if self.attempts == 0 {
            CorrectionPhase::Normal
        } else {
            CorrectionPhase::Correcting(self.attempts)
        }
    }

    /// Record that the pipeline produced a decision (accepted or not).
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_decision_time = Some(now);
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

/// What the pipeline must do after a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionStep {
    /// Back off, then validate a conservative decision for this attempt
    Retry { attempt: u32 },
    /// Budget spent: hand off to a human
    Escalate { attempts: u32 },
}

#[derive(Debug, Clone, Default)]
pub struct SelfCorrectionController {
    config: CorrectionConfig,
}

impl SelfCorrectionController {
    pub fn new(config: CorrectionConfig) -> Self {
        Self { config }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Settling delay before a conservative retry.
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.config.backoff_secs)
    }

    /// Advance the state machine on a validator rejection.
    pub fn on_rejection(&self, state: &mut CorrectionState) -> CorrectionStep {
        if state.attempts >= self.config.max_attempts {
            CorrectionStep::Escalate {
                attempts: state.attempts,
            }
        } else {
            state.attempts += 1;
            CorrectionStep::Retry {
                attempt: state.attempts,
            }
        }
    }

    /// Accepted decision (first pass or conservative): back to Normal.
    pub fn on_accepted(&self, state: &mut CorrectionState) {
        state.reset();
    }

    /// Inactivity amnesty. Returns true when the counter was cleared.
    pub fn apply_amnesty(&self, state: &mut CorrectionState, now: DateTime<Utc>) -> bool {
        let Some(last) = state.last_decision_time else {
            return false;
        };
        if state.attempts > 0 && (now - last).num_seconds() > self.config.inactivity_reset_secs {
            state.reset();
            return true;
        }
        false
    }

    /// Scaled-down variant of a rejected decision: deltas multiplied by the
    /// conservative factor, setpoint pinned to the current flame temperature,
    /// priority LOW.
    pub fn conservative(
        &self,
        normal: &ControlDecision,
        reading: &SensorReading,
        attempt: u32,
    ) -> ControlDecision {
        let k = self.config.conservative_factor;
        let mut reasoning = Vec::with_capacity(normal.reasoning.len() + 1);
        reasoning.push(format!("Conservative adjustment (attempt {attempt})"));
        reasoning.extend(normal.reasoning.iter().cloned());
        ControlDecision {
            fuel_adjustment: normal.fuel_adjustment * k,
            air_adjustment: normal.air_adjustment * k,
            feed_adjustment: normal.feed_adjustment * k,
            temp_setpoint: reading.flame_temperature,
            priority: Priority::Low,
            reasoning,
        }
    }

    pub fn snapshot(&self, state: &CorrectionState) -> CorrectionSnapshot {
        CorrectionSnapshot {
            phase: state.phase(),
            attempts: state.attempts,
            max_attempts: self.config.max_attempts,
            last_decision_time: state.last_decision_time,
        }
    }
}
