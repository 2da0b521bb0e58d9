//! Shared data structures for the clinkerisation decision pipeline
//!
//! - SensorReading / HistoricalContext (ingestion + aggregation inputs)
//! - QualityPrediction (predictor output)
//! - ControlDecision / DecisionRecord (generator, validator and history)
//! - EscalationBundle (human hand-off)
//! - AgentMetrics / AgentStatus (introspection)

mod sensor;
mod prediction;
mod decision;
mod escalation;
mod status;

pub use sensor::*;
pub use prediction::*;
pub use decision::*;
pub use escalation::*;
pub use status::*;

#[cfg(test)]
pub(crate) use sensor::fixtures;
