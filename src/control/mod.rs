//! Decision core
//!
//! Telemetry gate, rule-based policy, safety gatekeeper, self-correction
//! state machine and human escalation. Everything here is synchronous and
//! side-effect free except [`EscalationManager::deliver`].

pub mod correction;
pub mod escalation;
pub mod generator;
pub mod sensor_validator;
pub mod validator;

pub use correction::{CorrectionState, CorrectionStep, SelfCorrectionController, MAX_ATTEMPTS_EXCEEDED};
pub use escalation::{EscalationDelivery, EscalationManager};
pub use generator::{ControlDecisionGenerator, OPTIMAL_OPERATION};
pub use sensor_validator::{SensorRejection, SensorValidator};
pub use validator::{DecisionValidator, Rejection};
