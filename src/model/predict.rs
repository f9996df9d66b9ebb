//! Prediction endpoint client.
//!
//! The deployed model sits behind an HTTP endpoint that accepts the
//! payload produced by `crate::payload` and answers with a list of
//! per-instance predictions. Transport and service errors propagate
//! unchanged; retry policy belongs to callers, not here.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

use crate::error::{PipelineError, Result};

/// Response body of a prediction call.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionResponse {
    #[serde(default)]
    pub predictions: Vec<Value>,
    #[serde(default)]
    pub deployed_model_id: Option<String>,
}

/// Seam for issuing prediction requests, mockable in tests.
#[async_trait]
pub trait PredictionClient: Send + Sync {
    async fn predict(
        &self,
        instances: &[Map<String, Value>],
        parameters: &Map<String, Value>,
    ) -> Result<PredictionResponse>;
}

/// Client for a JSON-over-HTTP prediction endpoint.
pub struct HttpEndpointClient {
    client: reqwest::Client,
    endpoint_url: String,
}

impl HttpEndpointClient {
    /// Build a client for `endpoint_url`. An empty URL is rejected up
    /// front so a misconfigured run fails before any data work happens.
    pub fn new(endpoint_url: &str) -> Result<Self> {
        if endpoint_url.is_empty() {
            return Err(PipelineError::NoEndpoint);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            endpoint_url: endpoint_url.to_string(),
        })
    }
}

#[async_trait]
impl PredictionClient for HttpEndpointClient {
    async fn predict(
        &self,
        instances: &[Map<String, Value>],
        parameters: &Map<String, Value>,
    ) -> Result<PredictionResponse> {
        let body = json!({
            "instances": instances,
            "parameters": parameters,
        });

        log::info!(
            "sending {} instance(s) to {}",
            instances.len(),
            self.endpoint_url
        );
        let response = self
            .client
            .post(&self.endpoint_url)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::EndpointStatus(response.status()));
        }
        Ok(response.json().await?)
    }
}

/// True when any prediction flags the positive class.
///
/// The serving layer stringifies labels, so `"1"` and numeric `1` both
/// count.
pub fn high_risk(predictions: &[Value]) -> bool {
    predictions.iter().any(|pred| {
        match pred.get("predicted_label") {
            Some(Value::String(s)) => s == "1",
            Some(Value::Number(n)) => n.as_i64() == Some(1),
            _ => false,
        }
    })
}
