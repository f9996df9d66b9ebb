//! Model-facing surface: the fixed feature schema and the endpoint client.

pub mod predict;

pub use predict::{high_risk, HttpEndpointClient, PredictionClient, PredictionResponse};

/// The model's input features, in the order the training table and the
/// inference payload use them. The label column is deliberately absent:
/// inference rows never carry it.
///
/// Exact names are the contract with the trained model; renaming one here
/// without retraining breaks scoring.
pub const MODEL_FEATURES: [&str; 23] = [
    "pid",
    "session_id",
    "DM",
    "age_at_session",
    "avg_blood_flow",
    "avg_conductivity",
    "avg_dbp",
    "avg_dia_temp",
    "avg_sbp",
    "avg_uf_rate",
    "dialysis_vintage_years",
    "fluid_to_remove",
    "gender",
    "lag_1_avg_sbp",
    "lag_1_avg_uf_rate",
    "min_sbp",
    "minutes_into_session",
    "rolling_avg_sbp",
    "rolling_max_sbp",
    "rolling_stddev_sbp",
    "stddev_sbp",
    "trend_1_conductivity",
    "trend_1_sbp",
];
