//! System-wide default constants.
//!
//! Every `Default` impl in `agent_config.rs` reads from here so the numbers
//! live in one place. Grouped by subsystem for easy discovery.

// ============================================================================
// Historical Context
// ============================================================================

/// Average flame temperature reported when no aggregate data exists (°C).
pub const DEFAULT_AVG_FLAME_TEMP: f64 = 1450.0;

/// Average energy efficiency reported when no aggregate data exists.
pub const DEFAULT_AVG_EFFICIENCY: f64 = 0.8;

/// Average quality score reported when no aggregate data exists.
pub const DEFAULT_AVG_QUALITY: f64 = 0.85;

/// Flame-temperature spread reported when no aggregate data exists (°C).
pub const DEFAULT_TEMP_VARIANCE: f64 = 10.0;

/// Trailing window for the historical-context query (seconds). 3 600 = 1 hour.
pub const HISTORICAL_CONTEXT_WINDOW_SECS: i64 = 3_600;

// ============================================================================
// Decision History
// ============================================================================

/// In-memory decision ring-buffer capacity (records).
pub const DECISION_HISTORY_CAPACITY: usize = 100;

/// Records attached to an escalation bundle.
pub const ESCALATION_CONTEXT_RECORDS: usize = 5;

// ============================================================================
// Self-Correction
// ============================================================================

/// Conservative retries before a human is paged.
pub const MAX_CORRECTION_ATTEMPTS: u32 = 3;

/// Settling delay before each conservative retry (seconds).
pub const CORRECTION_BACKOFF_SECS: u64 = 10;

/// Multiplier applied to the normal decision's deltas on retry.
pub const CONSERVATIVE_FACTOR: f64 = 0.5;

/// Attempts counter is forgiven after this long without a decision (seconds). 900 = 15 min.
pub const CORRECTION_INACTIVITY_RESET_SECS: i64 = 900;

/// Prediction failures within the error window that trigger an escalation.
pub const PROCESSING_ERROR_ESCALATION_COUNT: usize = 5;

/// Recent cycles inspected for prediction failures.
pub const PROCESSING_ERROR_WINDOW: usize = 10;

// ============================================================================
// Transport
// ============================================================================

/// Bound on any single orchestrator / escalation HTTP call (seconds).
pub const DISPATCH_TIMEOUT_SECS: u64 = 5;

/// Path segment the orchestrator serves decisions on.
pub const ORCHESTRATOR_DECISIONS_PATH: &str = "/api/decisions";

/// Path segment the orchestrator serves operator alerts on.
pub const ORCHESTRATOR_ALERTS_PATH: &str = "/alerts";

// ============================================================================
// Periodic Monitors
// ============================================================================

/// Decision-monitor poll period (seconds).
pub const DECISION_MONITOR_INTERVAL_SECS: u64 = 30;

/// Delay after the last dispatch before its outcome is evaluated (seconds).
pub const OUTCOME_EVALUATION_DELAY_SECS: i64 = 120;

/// Decision-monitor sleep after a failed iteration (seconds).
pub const DECISION_MONITOR_ERROR_BACKOFF_SECS: u64 = 60;

/// Aggregate window queried by the outcome evaluator (seconds).
pub const OUTCOME_WINDOW_SECS: i64 = 300;

/// Flame-temperature std-dev below which the process counts as stable (°C).
pub const OUTCOME_MAX_TEMP_STDDEV: f64 = 15.0;

/// Self-correction heartbeat period (seconds). 300 = 5 min.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 300;

/// Heartbeat sleep after a failed iteration (seconds).
pub const HEARTBEAT_ERROR_BACKOFF_SECS: u64 = 600;

/// Metrics rollup poll period (seconds).
pub const ROLLUP_INTERVAL_SECS: u64 = 60;

/// Minimum spacing between two metrics reports (seconds). 600 = 10 min.
pub const ROLLUP_REPORT_INTERVAL_SECS: i64 = 600;

/// Rollup sleep after a failed iteration (seconds).
pub const ROLLUP_ERROR_BACKOFF_SECS: u64 = 120;

/// Records examined by the model performance check.
pub const PERFORMANCE_WINDOW: usize = 20;

/// HIGH-priority records in the window above which the model is suspect.
pub const PERFORMANCE_MAX_HIGH_PRIORITY: usize = 15;

/// Low-confidence records in the window above which uncertainty is flagged.
pub const PERFORMANCE_MAX_LOW_CONFIDENCE: usize = 10;

/// Confidence below which a record counts as low-confidence.
pub const PERFORMANCE_LOW_CONFIDENCE: f64 = 0.6;

/// Mean predicted quality below which decision logic should be reviewed.
pub const PERFORMANCE_MIN_MEAN_QUALITY: f64 = 0.7;

// ============================================================================
// Ingestion
// ============================================================================

/// Progress line cadence for the ingestion loop (readings).
pub const PROGRESS_LOG_EVERY: u64 = 100;

/// Capacity of the in-process telemetry window (samples). 3 600 = 1 hour at 1 Hz.
pub const TELEMETRY_WINDOW_CAPACITY: usize = 3_600;

/// Default sled database path.
pub const DEFAULT_STORE_PATH: &str = "./data/kiln_agent.db";
