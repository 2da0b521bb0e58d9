//! Agent Configuration Module
//!
//! Replaces hardcoded process thresholds, safety limits and monitor periods
//! with operator-tunable values loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `KILN_CONFIG` environment variable (path to TOML file)
//! 2. `kiln_agent.toml` in the current working directory
//! 3. Built-in defaults
//!
//! `ORCHESTRATOR_ENDPOINT` / `ESCALATION_ENDPOINT` override `[endpoints]`.
//!
//! ## Usage
//!
//! Components take their section explicitly; there is no process-wide
//! config global.
//!
//! ```ignore
//! let cfg = AgentConfig::load();
//! let validator = DecisionValidator::new(cfg.safety.clone(), cfg.validator.clone());
//! ```

mod agent_config;
pub mod defaults;
pub mod validation;

pub use agent_config::*;
