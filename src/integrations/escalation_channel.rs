//! Human escalation over HTTP

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::orchestrator::user_agent;
use super::{EscalationChannel, TransportError};
use crate::types::EscalationBundle;

/// Alert envelope POSTed to the escalation endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct AlertPayload<'a> {
    pub alert_type: &'static str,
    pub agent_id: &'a str,
    pub severity: &'static str,
    pub data: &'a EscalationBundle,
}

impl<'a> AlertPayload<'a> {
    pub fn human_escalation(agent_id: &'a str, bundle: &'a EscalationBundle) -> Self {
        Self {
            alert_type: "HUMAN_ESCALATION",
            agent_id,
            severity: "CRITICAL",
            data: bundle,
        }
    }
}

#[derive(Clone)]
pub struct HttpEscalationChannel {
    http: reqwest::Client,
    url: String,
}

impl HttpEscalationChannel {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent())
            .build()?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl EscalationChannel for HttpEscalationChannel {
    async fn notify(&self, agent_id: &str, bundle: &EscalationBundle) -> Result<(), TransportError> {
        let payload = AlertPayload::human_escalation(agent_id, bundle);
        let resp = self.http.post(&self.url).json(&payload).send().await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::ServerError(resp.status()))
        }
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AgentMetrics;
    use chrono::Utc;

    #[test]
    fn test_alert_envelope() {
        let bundle = EscalationBundle {
            timestamp: Utc::now(),
            reason: "maximum self-correction attempts exceeded".to_string(),
            correction_attempts: 3,
            recent_decisions: vec![],
            agent_metrics: AgentMetrics::default(),
            current_sensor_data: None,
            current_prediction: None,
        };
        let json =
            serde_json::to_value(AlertPayload::human_escalation("kiln_1", &bundle)).unwrap();
        assert_eq!(json["alert_type"], "HUMAN_ESCALATION");
        assert_eq!(json["severity"], "CRITICAL");
        assert_eq!(json["agent_id"], "kiln_1");
        assert_eq!(json["data"]["correction_attempts"], 3);
        assert!(json["data"].get("current_sensor_data").is_none());
    }
}
