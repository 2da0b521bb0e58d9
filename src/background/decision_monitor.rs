//! Decision monitor and outcome evaluator
//!
//! The monitor polls the pending-evaluation marker set on every dispatch.
//! Once the newest decision has had time to take effect it triggers one
//! evaluation and clears the marker. The evaluator answers triggers by
//! querying a short aggregate window and classifying the process state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{MonitorError, MonitorTask};
use crate::config::{MonitorConfig, ThresholdConfig};
use crate::integrations::{AggregateError, AggregateSource, WindowAggregate};
use crate::pipeline::AgentState;

// ============================================================================
// Decision Monitor
// ============================================================================

pub struct DecisionMonitor {
    state: Arc<RwLock<AgentState>>,
    trigger: mpsc::Sender<DateTime<Utc>>,
    interval: Duration,
    error_backoff: Duration,
    delay: chrono::Duration,
}

impl DecisionMonitor {
    pub fn new(
        state: Arc<RwLock<AgentState>>,
        trigger: mpsc::Sender<DateTime<Utc>>,
        config: &MonitorConfig,
    ) -> Self {
        Self {
            state,
            trigger,
            interval: Duration::from_secs(config.decision_interval_secs),
            error_backoff: Duration::from_secs(config.decision_error_backoff_secs),
            delay: chrono::Duration::seconds(config.evaluation_delay_secs),
        }
    }

    /// Returns the dispatch time that was handed to the evaluator, if any.
    pub async fn check_at(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, MonitorError> {
        let mut state = self.state.write().await;
        let Some(dispatched) = state.pending_evaluation else {
            return Ok(None);
        };
        if now - dispatched <= self.delay {
            return Ok(None);
        }
        match self.trigger.try_send(dispatched) {
            Ok(()) => {}
            // An evaluation is already queued; it covers this decision too
            Err(mpsc::error::TrySendError::Full(_)) => {}
            Err(mpsc::error::TrySendError::Closed(_)) => return Err(MonitorError::EvaluatorGone),
        }
        state.pending_evaluation = None;
        Ok(Some(dispatched))
    }
}

#[async_trait]
impl MonitorTask for DecisionMonitor {
    fn name(&self) -> &'static str {
        "DecisionMonitor"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn error_backoff(&self) -> Duration {
        self.error_backoff
    }

    async fn tick(&mut self) -> Result<(), MonitorError> {
        self.check_at(Utc::now()).await.map(|_| ())
    }
}

// ============================================================================
// Outcome Evaluator
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(WindowAggregate),
    Suboptimal {
        aggregate: WindowAggregate,
        issues: Vec<String>,
    },
}

/// Compare a window aggregate against the quality, efficiency and stability targets.
pub fn classify_outcome(
    aggregate: WindowAggregate,
    thresholds: &ThresholdConfig,
    max_temp_stddev: f64,
) -> Outcome {
    let mut issues = Vec::new();
    if aggregate.avg_quality < thresholds.min_quality_score {
        issues.push(format!("low quality ({:.2})", aggregate.avg_quality));
    }
    if aggregate.avg_efficiency < thresholds.min_energy_efficiency {
        issues.push(format!("low efficiency ({:.2})", aggregate.avg_efficiency));
    }
    if aggregate.temp_stddev >= max_temp_stddev {
        issues.push(format!("poor stability ({:.1})", aggregate.temp_stddev));
    }
    if issues.is_empty() {
        Outcome::Success(aggregate)
    } else {
        Outcome::Suboptimal { aggregate, issues }
    }
}

pub struct OutcomeEvaluator {
    source: Arc<dyn AggregateSource>,
    triggers: mpsc::Receiver<DateTime<Utc>>,
    thresholds: ThresholdConfig,
    window: chrono::Duration,
    max_temp_stddev: f64,
}

impl OutcomeEvaluator {
    /// Evaluator plus the sender the [`DecisionMonitor`] triggers it with.
    pub fn new(
        source: Arc<dyn AggregateSource>,
        thresholds: ThresholdConfig,
        config: &MonitorConfig,
    ) -> (mpsc::Sender<DateTime<Utc>>, Self) {
        let (tx, rx) = mpsc::channel(1);
        let evaluator = Self {
            source,
            triggers: rx,
            thresholds,
            window: chrono::Duration::seconds(config.outcome_window_secs),
            max_temp_stddev: config.outcome_max_temp_stddev,
        };
        (tx, evaluator)
    }

    pub async fn evaluate(&self) -> Result<Outcome, AggregateError> {
        let aggregate = self.source.window_aggregate(self.window).await?;
        let outcome = classify_outcome(aggregate, &self.thresholds, self.max_temp_stddev);
        match &outcome {
            Outcome::Success(a) => info!(
                "[OutcomeEvaluator] Decision outcome: SUCCESS - Quality: {:.2}, Efficiency: {:.2} ({} samples)",
                a.avg_quality, a.avg_efficiency, a.samples
            ),
            Outcome::Suboptimal { issues, .. } => warn!(
                "[OutcomeEvaluator] Decision outcome: SUBOPTIMAL - {}",
                issues.join(", ")
            ),
        }
        Ok(outcome)
    }

    /// Answer triggers until cancelled or every trigger sender is gone.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("[OutcomeEvaluator] Started");
        loop {
            let dispatched = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("[OutcomeEvaluator] Shutdown signal received");
                    break;
                }
                t = self.triggers.recv() => match t {
                    Some(t) => t,
                    None => break,
                }
            };
            info!("[OutcomeEvaluator] Evaluating decision dispatched at {}", dispatched);
            match self.evaluate().await {
                Ok(_) => {}
                Err(AggregateError::NoData) => {
                    info!("[OutcomeEvaluator] No process data in the evaluation window")
                }
                Err(e) => warn!("[OutcomeEvaluator] Error evaluating decision outcome: {}", e),
            }
        }
    }
}
