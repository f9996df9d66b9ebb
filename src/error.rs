//! Error types for the feature pipeline and its collaborators.

/// Errors surfaced by the library.
///
/// Schema problems are fatal by design: the model input schema is fixed by
/// name, so a missing feature can never be silently defaulted. Join losses
/// and unparseable timestamps are *not* errors (see `enrich` and
/// `timeparse`); they degrade to dropped rows and nulls respectively.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A requested model feature does not exist in the feature rows.
    #[error("unknown model feature `{0}`")]
    MissingFeature(String),

    /// No prediction endpoint configured (set `IDH_ENDPOINT_URL`).
    #[error("no prediction endpoint configured (set IDH_ENDPOINT_URL)")]
    NoEndpoint,

    /// The endpoint answered with a non-success HTTP status.
    #[error("endpoint returned status {0}")]
    EndpointStatus(reqwest::StatusCode),

    #[error("warehouse error: {0}")]
    Warehouse(#[from] rusqlite::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
