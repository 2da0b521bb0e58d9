//! Ingestion loop: drains one [`ReadingSource`] into the [`ControlAgent`].
//!
//! Cycles run inline, so the next reading is not pulled until the current
//! decision (including any correction backoff) has finished.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::agent::{ControlAgent, CycleOutcome, Verdict};
use super::source::{ReadingEvent, ReadingSource};
use crate::config::defaults::PROGRESS_LOG_EVERY;

/// Counters for one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub readings: u64,
    pub discarded: u64,
    pub dispatched: u64,
    pub escalated: u64,
    pub errors: u64,
    /// Ingestion stopped on a source failure rather than EOF or shutdown
    pub source_failed: bool,
}

pub struct ProcessingLoop {
    agent: Arc<ControlAgent>,
    cancel_token: CancellationToken,
}

impl ProcessingLoop {
    pub fn new(agent: Arc<ControlAgent>, cancel_token: CancellationToken) -> Self {
        Self {
            agent,
            cancel_token,
        }
    }

    /// Run until the source is exhausted, fails, or cancellation.
    pub async fn run<S: ReadingSource>(self, source: &mut S) -> LoopStats {
        let mut stats = LoopStats::default();
        let source_name = source.source_name().to_string();
        info!("[ReadingProcessor] Processing kiln telemetry from {}", source_name);

        loop {
            let event = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("[ReadingProcessor] Shutdown signal received");
                    break;
                }
                result = source.next_reading() => match result {
                    Ok(ev) => ev,
                    Err(e) => {
                        warn!("[ReadingProcessor] Source error: {}", e);
                        stats.source_failed = true;
                        self.agent
                            .escalate_critical(&format!("{source_name} source failed: {e:#}"))
                            .await;
                        break;
                    }
                }
            };

            let reading = match event {
                ReadingEvent::Reading(r) => *r,
                ReadingEvent::Eof => {
                    info!(
                        "[ReadingProcessor] Source reached end ({} readings processed)",
                        stats.readings
                    );
                    break;
                }
            };

            stats.readings += 1;
            match self.agent.process_reading(reading).await {
                Ok(CycleOutcome::Discarded(_)) => stats.discarded += 1,
                Ok(CycleOutcome::Decided(report)) => match report.verdict {
                    Verdict::Dispatched { .. } => stats.dispatched += 1,
                    Verdict::Escalated { .. } => stats.escalated += 1,
                    Verdict::RetryRejected { .. } | Verdict::Abandoned { .. } => {}
                },
                Err(e) => {
                    stats.errors += 1;
                    warn!("[ReadingProcessor] Cycle failed: {}", e);
                }
            }

            if stats.readings % PROGRESS_LOG_EVERY == 0 {
                info!(
                    "[ReadingProcessor] Progress: {} readings | dispatched {} | discarded {} | errors {}",
                    stats.readings, stats.dispatched, stats.discarded, stats.errors
                );
            }
        }

        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("   Readings Processed:   {}", stats.readings);
        info!("   Decisions Dispatched: {}", stats.dispatched);
        info!("   Readings Discarded:   {}", stats.discarded);
        info!("   Escalations:          {}", stats.escalated);
        info!("   Cycle Errors:         {}", stats.errors);
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        stats
    }
}
