//! # idhflow
//!
//! Prepares dialysis-session telemetry for an intradialytic hypotension
//! (IDH) classifier and carries the thin orchestration around it:
//!
//! 1. Irregular vital-sign streams are normalized (`timeparse`), grouped
//!    into clinical sessions by a gap threshold (`session`), and joined
//!    with registration and demographic reference data (`enrich`).
//! 2. Enriched measurements are aggregated into fixed-width time bins with
//!    lag/trend/rolling statistics and a forward-looking hypotension label
//!    (`features`), then either serialized into an inference payload
//!    (`payload`, `model`) or materialized as a training table.
//! 3. The training table is built at scale by the declarative twin of the
//!    same pipeline (`warehouse`): generated SQL plans executed on the
//!    store, required to match the in-process results numerically.
//!
//! All thresholds and window sizes travel in `config::FeatureParams` and
//! are passed explicitly into both substrates, never read from ambient
//! state, so the equivalence holds whenever callers supply equal values.
//!
//! ## Module organization
//!
//! - `config` - environment-driven configuration and pipeline parameters
//! - `types` - records for each pipeline stage
//! - `timeparse` - timestamp normalization and bin flooring
//! - `session` - gap-threshold sessionization
//! - `enrich` - registration and demographics joins
//! - `features` - per-bin aggregation, window features, labeling
//! - `split` - stable TRAIN/TEST assignment
//! - `payload` - inference payload serialization
//! - `warehouse` - declarative plan generation and the SQL store
//! - `io` - CSV/JSONL loading and persistence
//! - `fetch` - sample dataset download
//! - `model` - model feature schema and the endpoint client
//! - `error` - library error type

pub mod config;
pub mod enrich;
pub mod error;
pub mod features;
pub mod fetch;
pub mod io;
pub mod model;
pub mod payload;
pub mod session;
pub mod split;
pub mod timeparse;
pub mod types;
pub mod warehouse;

pub use config::{Config, FeatureParams, TableNames};
pub use error::{PipelineError, Result};
pub use features::aggregate_features;
pub use model::MODEL_FEATURES;
pub use payload::{prediction_payload, PredictionPayload};
pub use session::sessionize;
pub use split::DatasetSplit;
pub use types::{
    DemographicRecord, EnrichedMeasurement, FeatureRow, Measurement, RegistrationRecord,
    SessionizedMeasurement,
};
pub use warehouse::Warehouse;
