//! Periodic metrics rollup log

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;

use super::{MonitorError, MonitorTask};
use crate::config::MonitorConfig;
use crate::pipeline::AgentState;
use crate::types::AgentMetrics;

pub struct MetricsRollup {
    state: Arc<RwLock<AgentState>>,
    interval: Duration,
    error_backoff: Duration,
    report_every: chrono::Duration,
    last_report: DateTime<Utc>,
}

impl MetricsRollup {
    pub fn new(state: Arc<RwLock<AgentState>>, config: &MonitorConfig) -> Self {
        Self {
            state,
            interval: Duration::from_secs(config.rollup_interval_secs),
            error_backoff: Duration::from_secs(config.rollup_error_backoff_secs),
            report_every: chrono::Duration::seconds(config.rollup_report_secs),
            last_report: Utc::now(),
        }
    }

    /// Log a report if one is due. Returns the metrics that were reported.
    pub async fn report_at(&mut self, now: DateTime<Utc>) -> Option<AgentMetrics> {
        if now - self.last_report < self.report_every {
            return None;
        }
        let metrics = self.state.read().await.metrics.clone();

        info!("========================================");
        info!("AGENT PERFORMANCE METRICS");
        info!("========================================");
        info!("Messages Processed:    {}", metrics.messages_processed);
        info!("Decisions Made:        {}", metrics.decisions_made);
        info!("Corrections Attempted: {}", metrics.corrections_attempted);
        info!("Human Escalations:     {}", metrics.escalations);
        if let Some(rate) = metrics.decision_rate() {
            info!("Decision Rate:         {:.2}%", rate * 100.0);
        }
        info!("========================================");

        self.last_report = now;
        Some(metrics)
    }
}

#[async_trait]
impl MonitorTask for MetricsRollup {
    fn name(&self) -> &'static str {
        "MetricsRollup"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn error_backoff(&self) -> Duration {
        self.error_backoff
    }

    async fn tick(&mut self) -> Result<(), MonitorError> {
        self.report_at(Utc::now()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reports_every_ten_minutes() {
        let state = Arc::new(RwLock::new(AgentState::default()));
        state.write().await.metrics.messages_processed = 4;
        state.write().await.metrics.decisions_made = 1;

        let mut rollup = MetricsRollup::new(Arc::clone(&state), &MonitorConfig::default());
        let t0 = rollup.last_report;

        assert!(rollup.report_at(t0 + chrono::Duration::minutes(9)).await.is_none());
        let m = rollup.report_at(t0 + chrono::Duration::minutes(10)).await.unwrap();
        assert_eq!(m.decision_rate(), Some(0.25));
        // next window starts from the last report
        assert!(rollup.report_at(t0 + chrono::Duration::minutes(15)).await.is_none());
        assert!(rollup.report_at(t0 + chrono::Duration::minutes(20)).await.is_some());
    }
}
