//! Inference payload serialization.
//!
//! The endpoint expects `{"instances": [...], "parameters": {...}}` where
//! every instance carries exactly the named features. A requested feature
//! missing from the rows is a hard schema error, never default-filled.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PipelineError, Result};
use crate::types::FeatureRow;

/// Wire payload for the prediction endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionPayload {
    pub instances: Vec<Map<String, Value>>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// Project `feature_names` out of `rows` into a prediction payload.
///
/// Instances preserve both row order and the given feature order.
pub fn prediction_payload(rows: &[FeatureRow], feature_names: &[&str]) -> Result<PredictionPayload> {
    let mut instances = Vec::with_capacity(rows.len());
    for row in rows {
        let mut instance = Map::with_capacity(feature_names.len());
        for name in feature_names {
            let value = row
                .feature_value(name)
                .ok_or_else(|| PipelineError::MissingFeature((*name).to_string()))?;
            instance.insert((*name).to_string(), value);
        }
        instances.push(instance);
    }
    Ok(PredictionPayload {
        instances,
        parameters: Map::new(),
    })
}

/// Split a payload into the (instances, parameters) pair the endpoint
/// client sends. Missing parts default to empty.
pub fn prepare_for_inference(
    payload: &PredictionPayload,
) -> (Vec<Map<String, Value>>, Map<String, Value>) {
    (payload.instances.clone(), payload.parameters.clone())
}
