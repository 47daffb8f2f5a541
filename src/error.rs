//! Typed failures raised by the training and inference core.
//!
//! Callers at the serving boundary decide how each variant is presented;
//! nothing here formats user-facing messages beyond `Display`.

use std::path::PathBuf;
use thiserror::Error;

/// Raw records could not be turned into a feature table.
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("row {row}: unparseable transaction timestamp {value:?}")]
    InvalidTimestamp { row: usize, value: String },

    #[error("row {row}: required feature column `{column}` is missing")]
    MissingColumn { row: usize, column: &'static str },

    #[error("feature schema mismatch: model expects {expected:?}, data provides {actual:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },
}

/// The transaction store could not be read or written.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transaction store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transaction store decode error at line {line}: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("transaction store encode error: {0}")]
    Encode(#[source] serde_json::Error),
}

/// The artifact slot could not be read or written.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("no trained model at {0}")]
    NotFound(PathBuf),

    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("artifact store lock poisoned")]
    Poisoned,
}

/// A training invocation failed. A failed run never replaces the
/// previously persisted artifact.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("no transactions available to train on")]
    NoData,

    #[error("{count} training rows carry no `is_fraud` label")]
    MissingLabels { count: usize },

    #[error("failed to fetch transactions: {0}")]
    Store(#[from] StoreError),

    #[error("feature derivation failed: {0}")]
    Features(#[from] FeatureError),

    #[error("model fitting failed: {0}")]
    Fit(String),

    #[error("failed to persist trained model: {0}")]
    Persist(#[source] ArtifactError),
}

impl TrainingError {
    /// Empty store: a recoverable "nothing to train on" outcome.
    pub fn is_no_data(&self) -> bool {
        matches!(self, TrainingError::NoData)
    }
}

/// A prediction invocation failed.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("model has not been trained yet")]
    ModelNotFound,

    #[error("failed to load trained model: {0}")]
    Load(#[source] ArtifactError),

    #[error("failed to fetch transactions: {0}")]
    Store(#[from] StoreError),

    #[error("feature derivation failed: {0}")]
    Features(#[from] FeatureError),

    #[error("scoring failed: {0}")]
    Scoring(String),
}

impl PredictionError {
    /// Predict before any train: the caller should ask for a training run.
    pub fn is_model_not_found(&self) -> bool {
        matches!(self, PredictionError::ModelNotFound)
    }
}

impl From<ArtifactError> for PredictionError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::NotFound(_) => PredictionError::ModelNotFound,
            other => PredictionError::Load(other),
        }
    }
}
