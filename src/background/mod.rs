//! Background monitors
//!
//! Independent periodic tasks running beside the decision pipeline:
//!
//! | Task | Period | On error |
//! |---|---|---|
//! | `DecisionMonitor` | 30 s | 60 s |
//! | `CorrectionHeartbeat` | 5 min | 10 min |
//! | `MetricsRollup` | 60 s | 120 s |
//!
//! plus the trigger-driven `OutcomeEvaluator`. All of them observe the shared
//! `AgentState` through short lock-protected reads and stop on cancellation.

pub mod decision_monitor;
pub mod heartbeat;
pub mod rollup;

pub use decision_monitor::{classify_outcome, DecisionMonitor, Outcome, OutcomeEvaluator};
pub use heartbeat::{check_model_performance, CorrectionHeartbeat, PerformanceWarning};
pub use rollup::MetricsRollup;

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("outcome evaluator is no longer running")]
    EvaluatorGone,
}

/// One periodic check. `tick` runs first, then the task sleeps for
/// `interval`, or `error_backoff` after a failed tick.
#[async_trait]
pub trait MonitorTask: Send + 'static {
    fn name(&self) -> &'static str;
    fn interval(&self) -> Duration;
    fn error_backoff(&self) -> Duration;
    async fn tick(&mut self) -> Result<(), MonitorError>;
}

/// Drive a [`MonitorTask`] until cancelled.
pub async fn run_periodic<T: MonitorTask>(mut task: T, cancel: CancellationToken) {
    info!(interval_secs = task.interval().as_secs(), "[{}] Started", task.name());
    loop {
        let delay = match task.tick().await {
            Ok(()) => task.interval(),
            Err(e) => {
                error!("[{}] {}", task.name(), e);
                task.error_backoff()
            }
        };
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("[{}] Shutdown signal received", task.name());
                break;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
