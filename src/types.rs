//! Record types for every pipeline stage.
//!
//! The stages form a chain: `Measurement` (raw telemetry) gains session
//! metadata to become `SessionizedMeasurement`, is joined against
//! registration and demographics into `EnrichedMeasurement`, and is finally
//! aggregated into `FeatureRow` (one row per 15-minute time bin). Records
//! are immutable once built; each stage returns new values.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::split::DatasetSplit;
use crate::timeparse::serde_naive_opt;

/// One raw telemetry sample from a dialysis machine.
///
/// Vital values are optional: an unparseable source field degrades to
/// `None` and flows through aggregation as a null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub pid: i64,
    #[serde(with = "serde_naive_opt")]
    pub datatime: Option<NaiveDateTime>,
    pub sbp: Option<f64>,
    pub dbp: Option<f64>,
    pub dia_temp_value: Option<f64>,
    pub conductivity: Option<f64>,
    pub uf: Option<f64>,
    pub blood_flow: Option<f64>,
}

/// Per-visit registration metadata, keyed by patient and check-in date.
///
/// `keyindate` is the raw integer epoch from the source system; it is
/// converted to a timestamp at join time (`timeparse::from_raw_epoch`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub pid: i64,
    pub keyindate: i64,
    pub weightstart: Option<f64>,
    pub weightend: Option<f64>,
    pub dryweight: Option<f64>,
    /// Ambient temperature recorded at check-in.
    pub temperature: Option<f64>,
}

/// Static per-patient attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemographicRecord {
    pub pid: i64,
    pub gender: Option<String>,
    /// Birth year.
    pub birthday: Option<i64>,
    /// Raw integer epoch of the first dialysis treatment.
    pub first_dialysis: i64,
    /// Diabetes flag.
    #[serde(rename = "DM")]
    pub dm: Option<i64>,
}

/// A measurement annotated with its session assignment.
///
/// Row counts are preserved through sessionization: every input
/// `Measurement` yields exactly one `SessionizedMeasurement`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionizedMeasurement {
    pub pid: i64,
    #[serde(with = "serde_naive_opt")]
    pub datatime: Option<NaiveDateTime>,
    pub sbp: Option<f64>,
    pub dbp: Option<f64>,
    pub dia_temp_value: Option<f64>,
    pub conductivity: Option<f64>,
    pub uf: Option<f64>,
    pub blood_flow: Option<f64>,
    pub is_new_session: bool,
    /// `"{pid}_{ordinal}"`, ordinal 0-based per patient.
    pub session_id: String,
    /// Earliest measurement timestamp in the session.
    #[serde(with = "serde_naive_opt")]
    pub session_start_ts: Option<NaiveDateTime>,
}

/// A sessionized measurement joined with registration and demographics.
///
/// This is also the shape of the persisted session CSV (see `io`), so it
/// carries `weightend` and the ambient `temperature` even though the
/// feature aggregation does not consume them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedMeasurement {
    pub pid: i64,
    #[serde(with = "serde_naive_opt")]
    pub datatime: Option<NaiveDateTime>,
    pub session_id: String,
    #[serde(with = "serde_naive_opt")]
    pub session_start_ts: Option<NaiveDateTime>,
    #[serde(with = "serde_naive_opt")]
    pub first_dialysis_ts: Option<NaiveDateTime>,
    pub sbp: Option<f64>,
    pub dbp: Option<f64>,
    pub dia_temp_value: Option<f64>,
    pub conductivity: Option<f64>,
    pub uf: Option<f64>,
    pub blood_flow: Option<f64>,
    pub weightstart: Option<f64>,
    pub weightend: Option<f64>,
    pub dryweight: Option<f64>,
    pub temperature: Option<f64>,
    pub gender: Option<String>,
    pub birthday: Option<i64>,
    #[serde(rename = "DM")]
    pub dm: Option<i64>,
}

/// One aggregated time bin: the final projected feature set plus
/// identifiers, the bin timestamp, and the TRAIN/TEST assignment.
///
/// Field order matches the persisted feature-table column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub dataset_split: DatasetSplit,
    pub pid: i64,
    pub session_id: String,
    #[serde(with = "serde_naive_opt")]
    pub time_bin: Option<NaiveDateTime>,
    pub age_at_session: Option<i64>,
    pub dialysis_vintage_years: Option<f64>,
    pub fluid_to_remove: Option<f64>,
    pub minutes_into_session: Option<f64>,
    pub gender: Option<String>,
    #[serde(rename = "DM")]
    pub dm: Option<i64>,
    pub avg_sbp: Option<f64>,
    pub min_sbp: Option<f64>,
    pub stddev_sbp: Option<f64>,
    pub avg_dbp: Option<f64>,
    pub avg_dia_temp: Option<f64>,
    pub avg_conductivity: Option<f64>,
    pub avg_uf_rate: Option<f64>,
    pub avg_blood_flow: Option<f64>,
    pub lag_1_avg_sbp: Option<f64>,
    pub trend_1_sbp: Option<f64>,
    pub lag_1_avg_uf_rate: Option<f64>,
    pub trend_1_conductivity: Option<f64>,
    pub rolling_avg_sbp: Option<f64>,
    pub rolling_max_sbp: Option<f64>,
    pub rolling_stddev_sbp: Option<f64>,
    pub label: i64,
}

impl FeatureRow {
    /// Look up a feature by its model-schema name.
    ///
    /// Returns `None` for names outside the schema; absent values map to
    /// JSON null. Callers that require a name to exist (payload
    /// serialization) treat `None` as a hard schema error.
    pub fn feature_value(&self, name: &str) -> Option<serde_json::Value> {
        use serde_json::Value;

        fn num(v: Option<f64>) -> Value {
            v.map(Value::from).unwrap_or(Value::Null)
        }
        fn int(v: Option<i64>) -> Value {
            v.map(Value::from).unwrap_or(Value::Null)
        }

        let value = match name {
            "pid" => Value::from(self.pid),
            "session_id" => Value::from(self.session_id.clone()),
            "DM" => int(self.dm),
            "age_at_session" => int(self.age_at_session),
            "avg_blood_flow" => num(self.avg_blood_flow),
            "avg_conductivity" => num(self.avg_conductivity),
            "avg_dbp" => num(self.avg_dbp),
            "avg_dia_temp" => num(self.avg_dia_temp),
            "avg_sbp" => num(self.avg_sbp),
            "avg_uf_rate" => num(self.avg_uf_rate),
            "dialysis_vintage_years" => num(self.dialysis_vintage_years),
            "fluid_to_remove" => num(self.fluid_to_remove),
            "gender" => self
                .gender
                .clone()
                .map(Value::from)
                .unwrap_or(Value::Null),
            "lag_1_avg_sbp" => num(self.lag_1_avg_sbp),
            "lag_1_avg_uf_rate" => num(self.lag_1_avg_uf_rate),
            "min_sbp" => num(self.min_sbp),
            "minutes_into_session" => num(self.minutes_into_session),
            "rolling_avg_sbp" => num(self.rolling_avg_sbp),
            "rolling_max_sbp" => num(self.rolling_max_sbp),
            "rolling_stddev_sbp" => num(self.rolling_stddev_sbp),
            "stddev_sbp" => num(self.stddev_sbp),
            "trend_1_conductivity" => num(self.trend_1_conductivity),
            "trend_1_sbp" => num(self.trend_1_sbp),
            "label" => Value::from(self.label),
            _ => return None,
        };
        Some(value)
    }
}
