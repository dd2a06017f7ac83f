//! Error taxonomy for request handling and model inference.
//!
//! | Variant | When | Status |
//! |---------|------|--------|
//! | [`ServeError::Configuration`] | artifact cannot be loaded at startup | fatal |
//! | [`ServeError::MalformedRequest`] | payload not a mapping, or no features | 400 |
//! | [`ServeError::Coercion`] | a value cannot occupy its slot | 400 |
//! | [`ServeError::Inference`] | the model rejects the aligned row | 400 |
//!
//! Everything below `Configuration` is recovered at the request boundary.

use std::path::PathBuf;

use crate::align::AlignError;
use crate::input::PayloadError;
use crate::persist::ArtifactError;

/// Reasons the model rejects an aligned row.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("missing required column '{0}'")]
    MissingColumn(String),

    #[error("column '{column}' expects a number, got {value}")]
    NonNumeric { column: String, value: String },

    #[error("column '{column}' has unknown category {value:?}")]
    UnknownCategory { column: String, value: String },

    #[error("model produced a non-finite prediction")]
    NonFinite,
}

/// Top-level error for the service.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("failed to load model artifact {}: {source}", path.display())]
    Configuration {
        path: PathBuf,
        #[source]
        source: ArtifactError,
    },

    #[error("malformed request: {0}")]
    MalformedRequest(#[from] PayloadError),

    #[error("invalid {expected} field '{field}': {value}")]
    Coercion {
        field: String,
        value: String,
        expected: &'static str,
    },

    #[error("prediction failed: {0}")]
    Inference(#[from] InferenceError),
}

impl ServeError {
    /// HTTP status for request-level faults.
    pub fn status_code(&self) -> u16 {
        match self {
            ServeError::Configuration { .. } => 500,
            ServeError::MalformedRequest(_)
            | ServeError::Coercion { .. }
            | ServeError::Inference(_) => 400,
        }
    }

    /// Whether the caller can fix this by changing the request.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

impl From<AlignError> for ServeError {
    fn from(err: AlignError) -> Self {
        match err {
            AlignError::Empty => ServeError::MalformedRequest(PayloadError::Empty),
            AlignError::Coercion {
                field,
                value,
                expected,
            } => ServeError::Coercion {
                field,
                value: format!("{value} is not {expected}"),
                expected,
            },
        }
    }
}
