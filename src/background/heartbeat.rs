//! Self-correction heartbeat: inactivity amnesty plus model performance check

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{MonitorError, MonitorTask};
use crate::config::MonitorConfig;
use crate::pipeline::ControlAgent;
use crate::storage::DecisionHistory;
use crate::types::Priority;

#[derive(Debug, Clone, PartialEq)]
pub enum PerformanceWarning {
    /// Too many HIGH decisions; the model may need retraining
    HighPriorityShare { count: usize, window: usize },
    /// Too many low-confidence predictions
    LowConfidenceShare { count: usize, window: usize },
    /// Mean predicted quality below the floor
    LowMeanQuality(f64),
}

impl std::fmt::Display for PerformanceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HighPriorityShare { count, window } => write!(
                f,
                "high proportion of high-priority decisions ({count}/{window}), model may need retraining"
            ),
            Self::LowConfidenceShare { count, window } => write!(
                f,
                "high proportion of low-confidence predictions ({count}/{window}), model uncertainty high"
            ),
            Self::LowMeanQuality(q) => {
                write!(f, "low average predicted quality ({q:.2}), review decision logic")
            }
        }
    }
}

/// Inspect the last `performance_window` records. Silent until the history
/// holds a full window.
pub fn check_model_performance(
    history: &DecisionHistory,
    config: &MonitorConfig,
) -> Vec<PerformanceWarning> {
    let window = config.performance_window;
    if window == 0 || history.len() < window {
        return Vec::new();
    }

    let mut warnings = Vec::new();
    let high = history
        .last_n(window)
        .filter(|r| r.decision.priority == Priority::High)
        .count();
    if high > config.performance_max_high_priority {
        warnings.push(PerformanceWarning::HighPriorityShare { count: high, window });
    }

    let low_conf = history
        .last_n(window)
        .filter(|r| r.prediction.confidence < config.performance_low_confidence)
        .count();
    if low_conf > config.performance_max_low_confidence {
        warnings.push(PerformanceWarning::LowConfidenceShare { count: low_conf, window });
    }

    let mean_quality =
        history.last_n(window).map(|r| r.prediction.quality_score).sum::<f64>() / window as f64;
    if mean_quality < config.performance_min_mean_quality {
        warnings.push(PerformanceWarning::LowMeanQuality(mean_quality));
    }
    warnings
}

pub struct CorrectionHeartbeat {
    agent: Arc<ControlAgent>,
    config: MonitorConfig,
}

impl CorrectionHeartbeat {
    pub fn new(agent: Arc<ControlAgent>, config: MonitorConfig) -> Self {
        Self { agent, config }
    }
}

#[async_trait]
impl MonitorTask for CorrectionHeartbeat {
    fn name(&self) -> &'static str {
        "CorrectionHeartbeat"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.heartbeat_interval_secs)
    }

    fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.config.heartbeat_error_backoff_secs)
    }

    async fn tick(&mut self) -> Result<(), MonitorError> {
        let warnings = {
            let state = self.agent.state();
            let state = state.read().await;
            check_model_performance(&state.history, &self.config)
        };
        for w in &warnings {
            warn!("[CorrectionHeartbeat] {}", w);
        }

        if self.agent.apply_amnesty().await {
            info!("[CorrectionHeartbeat] Reset correction attempt counter due to inactivity");
        } else {
            debug!("[CorrectionHeartbeat] No correction state to clear");
        }
        Ok(())
    }
}
