//! Decision pipeline
//!
//! ```text
//! ReadingSource ─▶ ProcessingLoop ─▶ ControlAgent::process_reading
//!                                          │
//!                                          ├─▶ DecisionHistory / metrics (AgentState)
//!                                          ├─▶ PersistenceStore
//!                                          └─▶ OrchestratorClient
//! ```
//!
//! The background monitors read the same `AgentState` through
//! [`ControlAgent::state`].

mod state;
pub mod agent;
pub mod processing_loop;
pub mod source;

pub use agent::{
    ControlAgent, ControlAgentBuilder, CycleError, CycleOutcome, CycleReport, DeliveryStatus,
    Verdict,
};
pub use processing_loop::{LoopStats, ProcessingLoop};
pub use source::{
    ChannelSource, LineSource, ReadingEvent, ReadingSource, ReplaySource, StdinSource,
};
pub use state::AgentState;
