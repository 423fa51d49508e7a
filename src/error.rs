//! Error types for Glykos

use thiserror::Error;

/// Errors that can occur while transforming records or computing scores
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unsupported timestamp representation: {0}")]
    UnsupportedTimestampType(String),

    #[error("Total daily dose must be positive, got {0}")]
    InvalidDose(f64),

    #[error("Malformed record: missing required field `{0}`")]
    MalformedRecord(String),

    #[error("Sequence window {window} is outside the allowed range {min}..={max}")]
    WindowOutOfRange {
        window: usize,
        min: usize,
        max: usize,
    },

    #[error("Invalid query parameter: {0}")]
    InvalidQuery(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Record source failure: {0}")]
    SourceError(String),
}
