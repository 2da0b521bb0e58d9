//! Control agent: the single in-flight decision pipeline
//!
//! ```text
//! reading ─▶ SensorValidator ─▶ context ─▶ QualityPredictor ─▶ Generator
//!                                                                  │
//!                     ┌──────────── DecisionValidator ◀────────────┘
//!                     │accept                      │reject
//!                     ▼                            ▼
//!          record + dispatch           SelfCorrectionController
//!                                        │retry (after backoff)  │budget spent
//!                                        ▼                       ▼
//!                           conservative ─▶ validator     EscalationManager
//! ```
//!
//! Cycles are serialised by a pipeline mutex so decisions are generated and
//! validated in arrival order. Shared state sits behind a tokio `RwLock` that
//! is never held across an await on a collaborator.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::state::AgentState;
use crate::config::AgentConfig;
use crate::control::{
    ControlDecisionGenerator, CorrectionStep, DecisionValidator, EscalationManager, Rejection,
    SelfCorrectionController, SensorRejection, SensorValidator, MAX_ATTEMPTS_EXCEEDED,
};
use crate::integrations::{
    DecisionDispatch, EscalationChannel, HistoricalContextProvider, OrchestratorClient,
    StaticContextProvider, TelemetrySink, TransportError,
};
use crate::prediction::{PredictionError, QualityPredictor};
use crate::storage::{InMemoryStore, PersistenceStore};
use crate::types::{
    AgentStatus, ControlDecision, DecisionRecord, QualityPrediction, SensorReading, SystemStatus,
};

// ============================================================================
// Cycle Results
// ============================================================================

/// Failure that aborts a cycle without producing a decision.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CycleError {
    #[error("prediction failed: {0}")]
    Prediction(#[from] PredictionError),
}

/// What happened to a dispatch attempt. At-most-once: never retried in-cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Acknowledged,
    /// Orchestrator answered with a non-200 status
    Rejected(u16),
    Failed,
    TimedOut,
    /// No orchestrator endpoint configured
    Skipped,
}

impl DeliveryStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Rejected(_) | Self::Failed | Self::TimedOut)
    }
}

/// Validator outcome for the cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Accepted, first pass (`correction_attempt == 0`) or conservative retry
    Dispatched {
        correction_attempt: u32,
        delivery: DeliveryStatus,
    },
    /// The conservative retry was rejected too; correction continues next cycle
    RetryRejected { attempt: u32, rejection: Rejection },
    /// Retry budget spent, handed to a human
    Escalated { rejection: Rejection },
    /// Shutdown arrived during the correction backoff
    Abandoned { attempt: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub prediction: QualityPrediction,
    /// Decision that was validated last (conservative variant after a retry)
    pub decision: ControlDecision,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Reading failed the sensor gate; no decision produced
    Discarded(SensorRejection),
    Decided(Box<CycleReport>),
}

impl CycleOutcome {
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            Self::Decided(r) => Some(r),
            Self::Discarded(_) => None,
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Wires collaborators around an [`AgentConfig`]. Unset collaborators get
/// inert defaults: documented context tuple, no orchestrator, no escalation
/// endpoint, bounded in-memory store.
pub struct ControlAgentBuilder {
    config: AgentConfig,
    predictor: Arc<dyn QualityPredictor>,
    context: Option<Arc<dyn HistoricalContextProvider>>,
    orchestrator: Option<Arc<dyn OrchestratorClient>>,
    escalation: Option<Arc<dyn EscalationChannel>>,
    store: Option<Arc<dyn PersistenceStore>>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
    cancel: Option<CancellationToken>,
    live_clock: bool,
}

impl ControlAgentBuilder {
    pub fn context(mut self, provider: Arc<dyn HistoricalContextProvider>) -> Self {
        self.context = Some(provider);
        self
    }

    pub fn orchestrator(mut self, client: Arc<dyn OrchestratorClient>) -> Self {
        self.orchestrator = Some(client);
        self
    }

    pub fn escalation_channel(mut self, channel: Arc<dyn EscalationChannel>) -> Self {
        self.escalation = Some(channel);
        self
    }

    pub fn store(mut self, store: Arc<dyn PersistenceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Enforce reading freshness against the wall clock. Off for replays.
    pub fn live_clock(mut self, enabled: bool) -> Self {
        self.live_clock = enabled;
        self
    }

    pub fn build(self) -> ControlAgent {
        let cfg = self.config;
        let store: Arc<dyn PersistenceStore> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryStore::new(cfg.storage.memory_capacity)),
        };
        let context: Arc<dyn HistoricalContextProvider> = match self.context {
            Some(context) => context,
            None => Arc::new(StaticContextProvider::default()),
        };

        ControlAgent {
            agent_id: cfg.agent.agent_id.clone(),
            sensor_validator: SensorValidator::new(cfg.sensor_limits.clone()),
            predictor: self.predictor,
            context,
            generator: ControlDecisionGenerator::new(cfg.thresholds.clone()),
            validator: DecisionValidator::new(cfg.safety.clone(), cfg.validator.clone()),
            correction: SelfCorrectionController::new(cfg.correction.clone()),
            escalation: EscalationManager::new(
                cfg.agent.agent_id.clone(),
                cfg.history.escalation_context,
                self.escalation,
                Arc::clone(&store),
            ),
            orchestrator: self.orchestrator,
            store,
            telemetry: self.telemetry,
            dispatch_timeout: Duration::from_secs(cfg.endpoints.timeout_secs),
            error_escalation_count: cfg.correction.error_escalation_count,
            state: Arc::new(RwLock::new(AgentState::new(
                cfg.history.capacity,
                cfg.correction.error_window,
            ))),
            last_decision: ArcSwapOption::empty(),
            pipeline: Mutex::new(()),
            cancel: self.cancel.unwrap_or_default(),
            live_clock: self.live_clock,
        }
    }
}

// ============================================================================
// Control Agent
// ============================================================================

pub struct ControlAgent {
    agent_id: String,
    sensor_validator: SensorValidator,
    predictor: Arc<dyn QualityPredictor>,
    context: Arc<dyn HistoricalContextProvider>,
    generator: ControlDecisionGenerator,
    validator: DecisionValidator,
    correction: SelfCorrectionController,
    escalation: EscalationManager,
    orchestrator: Option<Arc<dyn OrchestratorClient>>,
    store: Arc<dyn PersistenceStore>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
    dispatch_timeout: Duration,
    error_escalation_count: usize,
    state: Arc<RwLock<AgentState>>,
    last_decision: ArcSwapOption<DecisionRecord>,
    /// One decision cycle at a time
    pipeline: Mutex<()>,
    cancel: CancellationToken,
    live_clock: bool,
}

impl ControlAgent {
    pub fn builder(config: AgentConfig, predictor: Arc<dyn QualityPredictor>) -> ControlAgentBuilder {
        ControlAgentBuilder {
            config,
            predictor,
            context: None,
            orchestrator: None,
            escalation: None,
            store: None,
            telemetry: None,
            cancel: None,
            live_clock: true,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Shared state handle for the periodic monitors.
    pub fn state(&self) -> Arc<RwLock<AgentState>> {
        Arc::clone(&self.state)
    }

    pub fn correction_controller(&self) -> &SelfCorrectionController {
        &self.correction
    }

    pub fn store(&self) -> &Arc<dyn PersistenceStore> {
        &self.store
    }

    /// Run one decision cycle for `reading`.
    pub async fn process_reading(&self, reading: SensorReading) -> Result<CycleOutcome, CycleError> {
        let _cycle = self.pipeline.lock().await;

        {
            let mut state = self.state.write().await;
            state.metrics.messages_processed += 1;
            if state.status == SystemStatus::Initializing {
                state.status = SystemStatus::Running;
            }
            if self.correction.apply_amnesty(&mut state.correction, Utc::now()) {
                state.status = SystemStatus::Running;
                info!("[ControlAgent] Correction attempts cleared after inactivity");
            }
        }

        // === Sensor gate ===
        let now = self.live_clock.then(Utc::now);
        if let Err(rejection) = self.sensor_validator.validate(&reading, now) {
            warn!("[ControlAgent] Discarding reading: {}", rejection);
            self.state.write().await.metrics.readings_discarded += 1;
            return Ok(CycleOutcome::Discarded(rejection));
        }

        // === Prediction ===
        let context = self.context.historical_context().await;
        let prediction = match self.predictor.predict(&reading, &context).await {
            Ok(p) => {
                self.state.write().await.record_cycle(false);
                p
            }
            Err(e) => {
                self.on_prediction_error(&reading, &e).await;
                return Err(e.into());
            }
        };
        if let Some(sink) = &self.telemetry {
            sink.record(&reading, &prediction);
        }

        // === Decision ===
        let decision = self.generator.generate(&reading, &prediction);
        debug!(
            priority = %decision.priority,
            fuel = decision.fuel_adjustment,
            air = decision.air_adjustment,
            feed = decision.feed_adjustment,
            "[ControlAgent] Proposed: {}",
            decision.reasoning_text()
        );

        let step = {
            let mut state = self.state.write().await;
            state.correction.touch(Utc::now());
            let verdict = self.validator.validate(&decision, &state.history);
            match verdict {
                Ok(()) => {
                    let record = self.accept(&mut state, &reading, &prediction, &decision, 0);
                    drop(state);
                    let delivery = self.finish_dispatch(record).await;
                    return Ok(decided(prediction, decision, Verdict::Dispatched {
                        correction_attempt: 0,
                        delivery,
                    }));
                }
                Err(rejection) => {
                    warn!(rule = rejection.rule(), "[ControlAgent] Decision rejected: {}", rejection);
                    let step = self.correction.on_rejection(&mut state.correction);
                    // Counts every entry into self-correction, the escalating one included
                    state.metrics.corrections_attempted += 1;
                    if let CorrectionStep::Retry { .. } = step {
                        state.status = SystemStatus::Correcting;
                    }
                    (step, rejection)
                }
            }
        };

        match step {
            (CorrectionStep::Escalate { attempts }, rejection) => {
                self.escalate(MAX_ATTEMPTS_EXCEEDED, attempts, Some(&reading), Some(&prediction))
                    .await;
                Ok(decided(prediction, decision, Verdict::Escalated { rejection }))
            }
            (CorrectionStep::Retry { attempt }, _) => {
                self.conservative_retry(reading, prediction, decision, attempt).await
            }
        }
    }

    /// Back off, then validate a scaled-down variant against the current history.
    async fn conservative_retry(
        &self,
        reading: SensorReading,
        prediction: QualityPrediction,
        normal: ControlDecision,
        attempt: u32,
    ) -> Result<CycleOutcome, CycleError> {
        info!(
            attempt,
            max = self.correction.max_attempts(),
            "[ControlAgent] Self-correction: backing off {:?}",
            self.correction.backoff()
        );

        tokio::select! {
            _ = self.cancel.cancelled() => {
                info!(attempt, "[ControlAgent] Shutdown during correction backoff, nothing dispatched");
                return Ok(decided(prediction, normal, Verdict::Abandoned { attempt }));
            }
            _ = tokio::time::sleep(self.correction.backoff()) => {}
        }

        let conservative = self.correction.conservative(&normal, &reading, attempt);

        let mut state = self.state.write().await;
        let verdict = self.validator.validate(&conservative, &state.history);
        match verdict {
            Ok(()) => {
                let record = self.accept(&mut state, &reading, &prediction, &conservative, attempt);
                drop(state);
                info!(attempt, "[ControlAgent] Conservative decision accepted");
                let delivery = self.finish_dispatch(record).await;
                Ok(decided(prediction, conservative, Verdict::Dispatched {
                    correction_attempt: attempt,
                    delivery,
                }))
            }
            Err(rejection) => {
                warn!(
                    attempt,
                    rule = rejection.rule(),
                    "[ControlAgent] Conservative decision rejected: {}",
                    rejection
                );
                Ok(decided(prediction, conservative, Verdict::RetryRejected { attempt, rejection }))
            }
        }
    }

    /// Record an accepted decision. Runs under the state write lock.
    fn accept(
        &self,
        state: &mut AgentState,
        reading: &SensorReading,
        prediction: &QualityPrediction,
        decision: &ControlDecision,
        correction_attempt: u32,
    ) -> Arc<DecisionRecord> {
        let record = Arc::new(DecisionRecord {
            recorded_at: Utc::now(),
            reading: reading.clone(),
            prediction: *prediction,
            decision: decision.clone(),
            correction_attempt,
        });
        state.history.append((*record).clone());
        self.correction.on_accepted(&mut state.correction);
        state.metrics.decisions_made += 1;
        state.pending_evaluation = Some(record.recorded_at);
        state.status = SystemStatus::Running;
        self.last_decision.store(Some(Arc::clone(&record)));
        record
    }

    /// Persist and dispatch an accepted record. Best-effort on both paths.
    async fn finish_dispatch(&self, record: Arc<DecisionRecord>) -> DeliveryStatus {
        if let Err(e) = self.store.append_decision(&record) {
            warn!(backend = self.store.backend_name(), "Failed to persist decision: {}", e);
        }

        let delivery = self.dispatch(&record).await;
        if delivery.is_failure() {
            self.state.write().await.metrics.delivery_failures += 1;
        }

        info!(
            priority = %record.decision.priority,
            attempt = record.correction_attempt,
            delivery = ?delivery,
            "[ControlAgent] Decision: fuel {:+.2} air {:+.2} feed {:+.2} setpoint {:.1}°C | {}",
            record.decision.fuel_adjustment,
            record.decision.air_adjustment,
            record.decision.feed_adjustment,
            record.decision.temp_setpoint,
            record.decision.reasoning_text()
        );
        delivery
    }

    async fn dispatch(&self, record: &DecisionRecord) -> DeliveryStatus {
        let Some(client) = &self.orchestrator else {
            warn!("[ControlAgent] No orchestrator endpoint configured, decision not dispatched");
            return DeliveryStatus::Skipped;
        };

        let dispatch = DecisionDispatch {
            agent_id: &self.agent_id,
            decision: &record.decision,
            reading: &record.reading,
            prediction: &record.prediction,
            correction_attempt: record.correction_attempt,
        };

        match tokio::time::timeout(self.dispatch_timeout, client.send_decision(dispatch)).await {
            Ok(Ok(ack)) => {
                if let Some(feedback) = ack.feedback {
                    info!("[ControlAgent] Orchestrator feedback: {}", feedback);
                }
                DeliveryStatus::Acknowledged
            }
            Ok(Err(TransportError::ServerError(status))) => {
                warn!(endpoint = client.endpoint(), "Orchestrator returned status {}", status);
                DeliveryStatus::Rejected(status.as_u16())
            }
            Ok(Err(e)) => {
                warn!(endpoint = client.endpoint(), "Failed to send decision: {}", e);
                DeliveryStatus::Failed
            }
            Err(_) => {
                warn!(
                    endpoint = client.endpoint(),
                    "Orchestrator did not answer within {:?}", self.dispatch_timeout
                );
                DeliveryStatus::TimedOut
            }
        }
    }

    async fn on_prediction_error(&self, reading: &SensorReading, err: &PredictionError) {
        warn!("[ControlAgent] Prediction failed: {}", err);
        let attempts = {
            let mut state = self.state.write().await;
            state.metrics.prediction_errors += 1;
            let failures = state.record_cycle(true);
            if failures <= self.error_escalation_count {
                return;
            }
            state.clear_cycle_window();
            state.correction.attempts()
        };
        let reason = format!("multiple processing errors: {err}");
        self.escalate(&reason, attempts, Some(reading), None).await;
    }

    /// Hand control to a human after an infrastructure failure outside a
    /// decision cycle (source failure, crashed task).
    pub async fn escalate_critical(&self, error: &str) {
        error!("[ControlAgent] Critical system error: {}", error);
        let attempts = self.state.read().await.correction.attempts();
        let reason = format!("Critical system error: {error}");
        self.escalate(&reason, attempts, None, None).await;
    }

    /// Bundle, deliver, then count the escalation and reset correction.
    async fn escalate(
        &self,
        reason: &str,
        attempts: u32,
        reading: Option<&SensorReading>,
        prediction: Option<&QualityPrediction>,
    ) {
        let bundle = {
            let state = self.state.read().await;
            self.escalation
                .bundle(reason, attempts, &state.history, &state.metrics, reading, prediction)
        };

        self.escalation.deliver(&bundle).await;

        let mut state = self.state.write().await;
        state.metrics.escalations += 1;
        state.correction.reset();
        state.status = SystemStatus::Running;
    }

    /// Inactivity amnesty, driven by the heartbeat. True when attempts were cleared.
    pub async fn apply_amnesty(&self) -> bool {
        let mut state = self.state.write().await;
        let cleared = self.correction.apply_amnesty(&mut state.correction, Utc::now());
        if cleared && state.status == SystemStatus::Correcting {
            state.status = SystemStatus::Running;
        }
        cleared
    }

    pub async fn get_status(&self) -> AgentStatus {
        let state = self.state.read().await;
        AgentStatus {
            agent_id: self.agent_id.clone(),
            status: state.status,
            uptime_secs: state.uptime_secs(),
            metrics: state.metrics.clone(),
            last_decision: self.last_decision.load_full().map(|r| (*r).clone()),
            correction: self.correction.snapshot(&state.correction),
            history_len: state.history.len(),
            thresholds: self.generator.thresholds().clone(),
            safety_limits: self.validator.limits().clone(),
        }
    }

    pub async fn mark_stopped(&self) {
        self.state.write().await.status = SystemStatus::Stopped;
    }
}

fn decided(prediction: QualityPrediction, decision: ControlDecision, verdict: Verdict) -> CycleOutcome {
    CycleOutcome::Decided(Box::new(CycleReport {
        prediction,
        decision,
        verdict,
    }))
}
