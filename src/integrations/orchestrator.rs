//! Orchestrator HTTP client: posts dispatched decisions

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{DecisionDispatch, OrchestratorAck, OrchestratorClient, TransportError};
use crate::types::Priority;

/// User-Agent sent with every request.
pub fn user_agent() -> String {
    format!("KilnAgent/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionBody {
    pub fuel_flow_adjustment: f64,
    pub air_flow_adjustment: f64,
    pub feed_rate_adjustment: f64,
    pub temperature_setpoint: f64,
    pub priority: Priority,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentState {
    pub flame_temperature: f64,
    pub fuel_flow_rate: f64,
    pub o2_level: f64,
    pub co_level: f64,
    pub feed_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionBody {
    pub quality_score: f64,
    pub energy_efficiency: f64,
    pub free_cao: f64,
    pub confidence: f64,
    pub c3s_content: f64,
    pub c2s_content: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchMetadata {
    pub correction_attempt: u32,
    pub agent_version: String,
    pub model_confidence: f64,
}

/// JSON body POSTed to the orchestrator decisions endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionPayload {
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    pub decision: DecisionBody,
    pub current_state: CurrentState,
    pub predictions: PredictionBody,
    pub metadata: DispatchMetadata,
}

impl DecisionPayload {
    pub fn build(dispatch: DecisionDispatch<'_>, timestamp: DateTime<Utc>) -> Self {
        let d = dispatch.decision;
        let r = dispatch.reading;
        let p = dispatch.prediction;
        Self {
            agent_id: dispatch.agent_id.to_string(),
            timestamp,
            decision: DecisionBody {
                fuel_flow_adjustment: d.fuel_adjustment,
                air_flow_adjustment: d.air_adjustment,
                feed_rate_adjustment: d.feed_adjustment,
                temperature_setpoint: d.temp_setpoint,
                priority: d.priority,
                reasoning: d.reasoning_text(),
            },
            current_state: CurrentState {
                flame_temperature: r.flame_temperature,
                fuel_flow_rate: r.fuel_flow_rate,
                o2_level: r.o2_level,
                co_level: r.co_level,
                feed_rate: r.feed_rate,
            },
            predictions: PredictionBody {
                quality_score: p.quality_score,
                energy_efficiency: p.energy_efficiency,
                free_cao: p.free_cao,
                confidence: p.confidence,
                c3s_content: p.c3s_content,
                c2s_content: p.c2s_content,
            },
            metadata: DispatchMetadata {
                correction_attempt: dispatch.correction_attempt,
                agent_version: env!("CARGO_PKG_VERSION").to_string(),
                model_confidence: p.confidence,
            },
        }
    }
}

/// HTTP client for the decisions endpoint.
#[derive(Clone)]
pub struct HttpOrchestratorClient {
    http: reqwest::Client,
    url: String,
}

impl HttpOrchestratorClient {
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
impl OrchestratorClient for HttpOrchestratorClient {
    async fn send_decision(
        &self,
        dispatch: DecisionDispatch<'_>,
    ) -> Result<OrchestratorAck, TransportError> {
        let payload = DecisionPayload::build(dispatch, Utc::now());
        let resp = self.http.post(&self.url).json(&payload).send().await?;

        match resp.status() {
            reqwest::StatusCode::OK => {
                let body = resp.bytes().await?;
                // An empty or non-JSON 200 is still an ack
                Ok(serde_json::from_slice(&body).unwrap_or_default())
            }
            status => Err(TransportError::ServerError(status)),
        }
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}
