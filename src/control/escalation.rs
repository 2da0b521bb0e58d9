//! Human escalation
//!
//! Terminal recovery path. Packages recent context into an
//! [`EscalationBundle`] and delivers it best-effort to the operator channel
//! and the durable store. Delivery failures are logged and swallowed.
//!
//! The counter increment and correction reset happen in the pipeline under
//! the state lock, after delivery.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::integrations::EscalationChannel;
use crate::storage::{DecisionHistory, PersistenceStore};
use crate::types::{AgentMetrics, EscalationBundle, QualityPrediction, SensorReading};

/// How a bundle fared on each delivery path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EscalationDelivery {
    pub notified: bool,
    pub persisted: bool,
}

pub struct EscalationManager {
    agent_id: String,
    context_records: usize,
    channel: Option<Arc<dyn EscalationChannel>>,
    store: Arc<dyn PersistenceStore>,
}

impl EscalationManager {
    pub fn new(
        agent_id: impl Into<String>,
        context_records: usize,
        channel: Option<Arc<dyn EscalationChannel>>,
        store: Arc<dyn PersistenceStore>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            context_records,
            channel,
            store,
        }
    }

    /// Snapshot everything an operator needs. Call with the state lock held.
    pub fn bundle(
        &self,
        reason: &str,
        correction_attempts: u32,
        history: &DecisionHistory,
        metrics: &AgentMetrics,
        reading: Option<&SensorReading>,
        prediction: Option<&QualityPrediction>,
    ) -> EscalationBundle {
        EscalationBundle {
            timestamp: Utc::now(),
            reason: reason.to_string(),
            correction_attempts,
            recent_decisions: history.tail(self.context_records),
            agent_metrics: metrics.clone(),
            current_sensor_data: reading.map(Into::into),
            current_prediction: prediction.map(Into::into),
        }
    }

    /// Deliver without holding any lock. Never fails.
    pub async fn deliver(&self, bundle: &EscalationBundle) -> EscalationDelivery {
        error!("================================================================");
        error!("HUMAN ESCALATION REQUIRED");
        error!("  Agent:    {}", self.agent_id);
        error!("  Reason:   {}", bundle.reason);
        error!("  Attempts: {}", bundle.correction_attempts);
        if let Some(r) = &bundle.current_sensor_data {
            error!(
                "  Kiln:     flame {:.1}°C, O2 {:.2}%, CO {:.0} ppm, fuel {:.1} kg/hr",
                r.flame_temperature, r.o2_level, r.co_level, r.fuel_flow_rate
            );
        }
        error!("================================================================");

        let mut delivery = EscalationDelivery::default();

        match &self.channel {
            Some(channel) => match channel.notify(&self.agent_id, bundle).await {
                Ok(()) => {
                    info!(endpoint = channel.endpoint(), "Escalation alert delivered");
                    delivery.notified = true;
                }
                Err(e) => warn!(endpoint = channel.endpoint(), "Escalation alert failed: {}", e),
            },
            None => warn!("No escalation endpoint configured, alert logged only"),
        }

        match self.store.append_escalation(bundle) {
            Ok(()) => delivery.persisted = true,
            Err(e) => warn!(backend = self.store.backend_name(), "Failed to persist escalation: {}", e),
        }

        delivery
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::TransportError;
    use crate::storage::decision_history::test_records::{prediction, record};
    use crate::storage::InMemoryStore;
    use crate::types::fixtures::nominal_reading;
    use crate::types::Priority;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    #[async_trait]
    impl EscalationChannel for Recorder {
        async fn notify(&self, agent_id: &str, bundle: &EscalationBundle) -> Result<(), TransportError> {
            self.0.lock().unwrap().push(format!("{agent_id}:{}", bundle.reason));
            Ok(())
        }
        fn endpoint(&self) -> &str {
            "recorder"
        }
    }

    struct Down;

    #[async_trait]
    impl EscalationChannel for Down {
        async fn notify(&self, _: &str, _: &EscalationBundle) -> Result<(), TransportError> {
            Err(TransportError::Unavailable("down".to_string()))
        }
        fn endpoint(&self) -> &str {
            "down"
        }
    }

    fn history(n: usize) -> DecisionHistory {
        let mut h = DecisionHistory::default();
        for i in 0..n {
            h.append(record(i as f64, Priority::Low));
        }
        h
    }

    #[test]
    fn test_bundle_keeps_last_five() {
        let store = Arc::new(InMemoryStore::default());
        let m = EscalationManager::new("kiln", 5, None, store);
        let reading = nominal_reading();
        let b = m.bundle(
            "maximum self-correction attempts exceeded",
            3,
            &history(8),
            &AgentMetrics::default(),
            Some(&reading),
            Some(&prediction()),
        );
        assert_eq!(b.recent_decisions.len(), 5);
        assert_eq!(b.recent_decisions[0].decision.fuel_adjustment, 3.0);
        assert_eq!(b.correction_attempts, 3);
        assert_eq!(b.current_sensor_data.unwrap().flame_temperature, 1450.0);
        assert_eq!(b.current_prediction.unwrap().confidence, 0.7);
    }

    #[tokio::test]
    async fn test_delivery_reaches_both_paths() {
        let store = Arc::new(InMemoryStore::default());
        let channel = Arc::new(Recorder::default());
        let m = EscalationManager::new("kiln", 5, Some(channel.clone()), store.clone());
        let b = m.bundle("test", 0, &history(0), &AgentMetrics::default(), None, None);

        let d = m.deliver(&b).await;
        assert_eq!(d, EscalationDelivery { notified: true, persisted: true });
        assert_eq!(channel.0.lock().unwrap().as_slice(), ["kiln:test"]);
        assert_eq!(store.recent_escalations(10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_channel_failure_is_swallowed() {
        let store = Arc::new(InMemoryStore::default());
        let m = EscalationManager::new("kiln", 5, Some(Arc::new(Down)), store.clone());
        let b = m.bundle("test", 1, &history(1), &AgentMetrics::default(), None, None);
        let d = m.deliver(&b).await;
        assert!(!d.notified);
        assert!(d.persisted);
    }
}
