//! Control Loop Integration Tests
//!
//! Drives `ControlAgent` through its public API with in-memory collaborators:
//! decision rules, validator gating, conservative retries with backoff,
//! escalation after the retry budget, dispatch timeouts and persistence.
//! Backoff sleeps run on paused tokio time.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

use kiln_agent::config::AgentConfig;
use kiln_agent::control::OPTIMAL_OPERATION;
use kiln_agent::integrations::{
    DecisionDispatch, EscalationChannel, OrchestratorAck, OrchestratorClient, TransportError,
};
use kiln_agent::prediction::{PredictionError, QualityPredictor};
use kiln_agent::storage::{InMemoryStore, PersistenceStore, SledStore};
use kiln_agent::types::{CorrectionPhase, EscalationBundle, HistoricalContext};
use kiln_agent::{
    ControlAgent, CycleOutcome, CycleReport, DeliveryStatus, Priority, QualityPrediction,
    SensorReading, SystemStatus, Verdict,
};

// ============================================================================
// Collaborators
// ============================================================================

struct FixedPredictor(QualityPrediction);

#[async_trait]
impl QualityPredictor for FixedPredictor {
    async fn predict(
        &self,
        _reading: &SensorReading,
        _context: &HistoricalContext,
    ) -> Result<QualityPrediction, PredictionError> {
        Ok(self.0)
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Sent {
    correction_attempt: u32,
    priority: Priority,
    fuel: f64,
}

#[derive(Default)]
struct RecordingOrchestrator {
    sent: Mutex<Vec<Sent>>,
    delay: Option<Duration>,
}

#[async_trait]
impl OrchestratorClient for RecordingOrchestrator {
    async fn send_decision(
        &self,
        dispatch: DecisionDispatch<'_>,
    ) -> Result<OrchestratorAck, TransportError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.sent.lock().unwrap().push(Sent {
            correction_attempt: dispatch.correction_attempt,
            priority: dispatch.decision.priority,
            fuel: dispatch.decision.fuel_adjustment,
        });
        Ok(OrchestratorAck::default())
    }

    fn endpoint(&self) -> &str {
        "memory://orchestrator"
    }
}

#[derive(Default)]
struct RecordingChannel(Mutex<Vec<EscalationBundle>>);

#[async_trait]
impl EscalationChannel for RecordingChannel {
    async fn notify(&self, _agent_id: &str, bundle: &EscalationBundle) -> Result<(), TransportError> {
        self.0.lock().unwrap().push(bundle.clone());
        Ok(())
    }

    fn endpoint(&self) -> &str {
        "memory://alerts"
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn reading() -> SensorReading {
    SensorReading {
        timestamp: chrono::Utc::now(),
        flame_temperature: 1450.0,
        material_temperature: 1200.0,
        shell_temperature: 350.0,
        draft_pressure: -50.0,
        combustion_air_pressure: 200.0,
        o2_level: 2.5,
        co_level: 30.0,
        nox_level: 800.0,
        raw_meal_flow: 100.0,
        fuel_flow_rate: 45.0,
        kiln_rpm: 2.5,
        feed_rate: 120.0,
    }
}

fn lean_reading() -> SensorReading {
    SensorReading {
        o2_level: 1.5,
        ..reading()
    }
}

fn prediction(free_cao: f64, confidence: f64) -> QualityPrediction {
    QualityPrediction {
        c3s_content: 55.0,
        c2s_content: 20.0,
        c3a_content: 8.0,
        c4af_content: 10.0,
        free_cao,
        quality_score: 0.9,
        energy_efficiency: 0.85,
        confidence,
    }
}

struct Harness {
    agent: ControlAgent,
    orchestrator: Arc<RecordingOrchestrator>,
    alerts: Arc<RecordingChannel>,
    store: Arc<InMemoryStore>,
}

fn harness_with(config: AgentConfig, prediction: QualityPrediction) -> Harness {
    let orchestrator = Arc::new(RecordingOrchestrator::default());
    let alerts = Arc::new(RecordingChannel::default());
    let store = Arc::new(InMemoryStore::default());
    let agent = ControlAgent::builder(config, Arc::new(FixedPredictor(prediction)))
        .orchestrator(orchestrator.clone())
        .escalation_channel(alerts.clone())
        .store(store.clone())
        .build();
    Harness {
        agent,
        orchestrator,
        alerts,
        store,
    }
}

fn harness(prediction: QualityPrediction) -> Harness {
    harness_with(AgentConfig::default(), prediction)
}

fn report(outcome: CycleOutcome) -> CycleReport {
    match outcome {
        CycleOutcome::Decided(report) => *report,
        CycleOutcome::Discarded(r) => panic!("reading unexpectedly discarded: {r}"),
    }
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// ============================================================================
// Decision rules through the pipeline
// ============================================================================

#[tokio::test]
async fn test_nominal_reading_is_optimal_operation() {
    let h = harness(prediction(1.0, 0.9));
    let r = report(assert_ok!(h.agent.process_reading(reading()).await));

    assert_eq!(r.decision.adjustments(), [0.0, 0.0, 0.0]);
    assert_eq!(r.decision.reasoning_text(), OPTIMAL_OPERATION);
    assert_ne!(r.decision.priority, Priority::High);
    assert_eq!(
        r.verdict,
        Verdict::Dispatched {
            correction_attempt: 0,
            delivery: DeliveryStatus::Acknowledged
        }
    );
    assert_eq!(h.orchestrator.sent.lock().unwrap().len(), 1);
    assert_eq!(h.store.recent_decisions(10).unwrap().len(), 1);
}

#[tokio::test]
async fn test_high_free_cao_raises_setpoint_and_cuts_feed() {
    let h = harness(prediction(2.3, 1.0));
    let r = report(h.agent.process_reading(reading()).await.unwrap());

    assert!(approx(r.decision.temp_setpoint, 1452.4));
    assert!(approx(r.decision.feed_adjustment, -0.69));
    assert_eq!(r.decision.priority, Priority::High);
    assert!(matches!(r.verdict, Verdict::Dispatched { correction_attempt: 0, .. }));
}

#[tokio::test]
async fn test_lean_combustion_adds_air() {
    let h = harness(prediction(1.0, 1.0));
    let r = report(h.agent.process_reading(lean_reading()).await.unwrap());

    assert!(approx(r.decision.air_adjustment, 1.0));
    assert_eq!(r.decision.priority, Priority::High);
}

// ============================================================================
// Self-correction and escalation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_rejected_decision_retried_conservatively_after_backoff() {
    let mut config = AgentConfig::default();
    config.safety.max_fuel_adjustment = 4.0;
    let h = harness_with(config, prediction(1.0, 1.0));

    // 100 °C below the band asks for +5 kg/hr, over the 4 kg/hr limit
    let cold = SensorReading {
        flame_temperature: 1300.0,
        ..reading()
    };
    let start = tokio::time::Instant::now();
    let r = report(h.agent.process_reading(cold).await.unwrap());
    assert!(start.elapsed() >= Duration::from_secs(10));

    assert!(approx(r.decision.fuel_adjustment, 2.5));
    assert_eq!(r.decision.priority, Priority::Low);
    assert_eq!(r.decision.temp_setpoint, 1300.0);
    assert!(r.decision.reasoning_text().starts_with("Conservative adjustment (attempt 1)"));
    assert!(matches!(r.verdict, Verdict::Dispatched { correction_attempt: 1, .. }));

    let sent = h.orchestrator.sent.lock().unwrap().clone();
    assert_eq!(
        sent,
        vec![Sent {
            correction_attempt: 1,
            priority: Priority::Low,
            fuel: 2.5
        }]
    );

    let status = h.agent.get_status().await;
    assert_eq!(status.metrics.corrections_attempted, 1);
    assert_eq!(status.metrics.decisions_made, 1);
    assert_eq!(status.correction.phase, CorrectionPhase::Normal);
    assert_eq!(status.status, SystemStatus::Running);
}

#[tokio::test(start_paused = true)]
async fn test_high_priority_streak_then_escalation() {
    let h = harness(prediction(1.0, 1.0));

    for _ in 0..4 {
        let r = report(h.agent.process_reading(lean_reading()).await.unwrap());
        assert_eq!(r.decision.priority, Priority::High);
        assert!(matches!(r.verdict, Verdict::Dispatched { .. }));
    }

    // A nominal decision is within limits but four of the last five were HIGH
    for attempt in 1..=3 {
        let r = report(h.agent.process_reading(reading()).await.unwrap());
        match r.verdict {
            Verdict::RetryRejected { attempt: a, rejection } => {
                assert_eq!(a, attempt);
                assert_eq!(rejection.rule(), "high_priority_streak");
            }
            other => panic!("expected a rejected retry, got {other:?}"),
        }
        let status = h.agent.get_status().await;
        assert_eq!(status.correction.attempts, attempt);
        assert_eq!(status.status, SystemStatus::Correcting);
        assert!(h.alerts.0.lock().unwrap().is_empty());
    }

    // Fourth rejection in a row exceeds the budget
    let r = report(h.agent.process_reading(reading()).await.unwrap());
    assert!(matches!(r.verdict, Verdict::Escalated { .. }));

    let alerts = h.alerts.0.lock().unwrap().clone();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].reason, "maximum self-correction attempts exceeded");
    assert_eq!(alerts[0].correction_attempts, 3);
    assert_eq!(alerts[0].recent_decisions.len(), 4);
    assert!(alerts[0].current_sensor_data.is_some());
    assert!(alerts[0].current_prediction.is_some());
    assert_eq!(h.store.recent_escalations(10).unwrap().len(), 1);

    let status = h.agent.get_status().await;
    assert_eq!(status.correction.attempts, 0);
    assert_eq!(status.metrics.escalations, 1);
    // three retries plus the rejection that escalated
    assert_eq!(status.metrics.corrections_attempted, 4);
    assert_eq!(status.metrics.decisions_made, 4);
    assert_eq!(status.status, SystemStatus::Running);

    // Escalation is not absorbing: the next rejection starts over
    let r = report(h.agent.process_reading(reading()).await.unwrap());
    assert!(matches!(r.verdict, Verdict::RetryRejected { attempt: 1, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_backoff_dispatches_nothing() {
    let mut config = AgentConfig::default();
    config.safety.max_fuel_adjustment = 4.0;
    let orchestrator = Arc::new(RecordingOrchestrator::default());
    let cancel = CancellationToken::new();
    let agent = Arc::new(
        ControlAgent::builder(config, Arc::new(FixedPredictor(prediction(1.0, 1.0))))
            .orchestrator(orchestrator.clone())
            .cancel_token(cancel.clone())
            .build(),
    );

    let cold = SensorReading {
        flame_temperature: 1300.0,
        ..reading()
    };
    let task = {
        let agent = Arc::clone(&agent);
        tokio::spawn(async move { agent.process_reading(cold).await })
    };
    tokio::time::sleep(Duration::from_secs(2)).await;
    cancel.cancel();

    let r = report(task.await.unwrap().unwrap());
    assert_eq!(r.verdict, Verdict::Abandoned { attempt: 1 });
    assert!(orchestrator.sent.lock().unwrap().is_empty());
    // the attempt counter survives for the next cycle
    assert_eq!(agent.get_status().await.correction.attempts, 1);
}

// ============================================================================
// Dispatch and persistence
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_slow_orchestrator_times_out_as_delivery_failure() {
    let orchestrator = Arc::new(RecordingOrchestrator {
        delay: Some(Duration::from_secs(30)),
        ..Default::default()
    });
    let agent = ControlAgent::builder(
        AgentConfig::default(),
        Arc::new(FixedPredictor(prediction(1.0, 0.9))),
    )
    .orchestrator(orchestrator)
    .build();

    let r = report(agent.process_reading(reading()).await.unwrap());
    assert_eq!(
        r.verdict,
        Verdict::Dispatched {
            correction_attempt: 0,
            delivery: DeliveryStatus::TimedOut
        }
    );

    let status = agent.get_status().await;
    // still recorded locally
    assert_eq!(status.history_len, 1);
    assert_eq!(status.metrics.delivery_failures, 1);
    assert!(status.last_decision.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_accepted_decisions_respect_safety_limits() {
    let h = harness(prediction(4.5, 1.0));
    let readings = [
        SensorReading { flame_temperature: 1350.0, ..reading() },
        SensorReading { flame_temperature: 1560.0, o2_level: 6.0, ..reading() },
        SensorReading { co_level: 400.0, ..reading() },
        SensorReading { o2_level: 0.5, co_level: 900.0, ..reading() },
    ];
    for r in readings {
        let _ = h.agent.process_reading(r).await;
    }
    let status = h.agent.get_status().await;
    let limits = status.safety_limits;
    for record in h.store.recent_decisions(100).unwrap() {
        let d = record.decision;
        assert!(d.fuel_adjustment.abs() <= limits.max_fuel_adjustment);
        assert!(d.air_adjustment.abs() <= limits.max_air_adjustment);
        assert!(d.feed_adjustment.abs() <= limits.max_feed_adjustment);
        assert!((limits.min_temp_setpoint..=limits.max_temp_setpoint).contains(&d.temp_setpoint));
    }
}

#[tokio::test]
async fn test_sled_store_keeps_dispatched_records() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SledStore::open(dir.path().join("kiln.db")).unwrap());
    let agent = ControlAgent::builder(
        AgentConfig::default(),
        Arc::new(FixedPredictor(prediction(1.0, 0.9))),
    )
    .store(store.clone())
    .build();

    assert_ok!(agent.process_reading(reading()).await);
    assert_ok!(agent.process_reading(reading()).await);
    // out-of-range readings never reach the store
    assert_ok!(
        agent
            .process_reading(SensorReading { fuel_flow_rate: 250.0, ..reading() })
            .await
    );
    assert_eq!(store.decision_count(), 2);
    assert_eq!(store.recent_decisions(1).unwrap().len(), 1);
}

#[tokio::test]
async fn test_prediction_failure_aborts_cycle() {
    struct Offline;

    #[async_trait]
    impl QualityPredictor for Offline {
        async fn predict(
            &self,
            _: &SensorReading,
            _: &HistoricalContext,
        ) -> Result<QualityPrediction, PredictionError> {
            Err(PredictionError::Model("feature vector rejected".to_string()))
        }
        fn name(&self) -> &'static str {
            "offline"
        }
    }

    let agent = ControlAgent::builder(AgentConfig::default(), Arc::new(Offline)).build();
    assert_err!(agent.process_reading(reading()).await);
    let status = agent.get_status().await;
    assert_eq!(status.metrics.prediction_errors, 1);
    assert_eq!(status.history_len, 0);
    assert!(status.last_decision.is_none());
}
