//! Request orchestration: payload → derive → align → infer.
//!
//! [`PredictionService`] is built once at startup and shared read-only
//! across all requests. Each request walks
//!
//! ```text
//! Received → Validated → Derived → Aligned → Inferred → Responded
//! ```
//!
//! and any fault along the way ends it with a [`ServeError`]. Nothing is
//! retried and nothing is cached between requests.

use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::align::{AlignedRow, Aligner};
use crate::config::ServeConfig;
use crate::derive::FeatureDeriver;
use crate::error::ServeError;
use crate::input::{PayloadError, RawInput};
use crate::model::{PipelineModel, Predictor};
use crate::schema::{self, FeatureKind, FeatureSchema, TrainingReport};

// =============================================================================
// Request stages
// =============================================================================

/// Progress of one request through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStage {
    Received,
    Validated,
    Derived,
    Aligned,
    Inferred,
    Responded,
}

impl fmt::Display for RequestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestStage::Received => "received",
            RequestStage::Validated => "validated",
            RequestStage::Derived => "derived",
            RequestStage::Aligned => "aligned",
            RequestStage::Inferred => "inferred",
            RequestStage::Responded => "responded",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Response bodies
// =============================================================================

/// Successful prediction body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionResponse {
    pub prediction: f64,
}

/// Failure body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<&ServeError> for ErrorResponse {
    fn from(err: &ServeError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

/// Schema details exposed by the metadata endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaDetails {
    pub features: Vec<String>,
    pub feature_types: Vec<FeatureKind>,
    #[serde(flatten)]
    pub training: TrainingReport,
}

/// Metadata endpoint body: `{"available": false}` without a schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetaResponse {
    pub available: bool,
    #[serde(flatten)]
    pub schema: Option<SchemaDetails>,
}

/// Liveness body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
    pub model_loaded: bool,
}

// =============================================================================
// PredictionService
// =============================================================================

/// Immutable request pipeline.
pub struct PredictionService {
    schema: Option<Arc<FeatureSchema>>,
    deriver: FeatureDeriver,
    aligner: Aligner,
    predictor: Arc<dyn Predictor>,
    model_name: String,
}

impl fmt::Debug for PredictionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredictionService")
            .field("schema", &self.schema)
            .field("deriver", &self.deriver)
            .field("model_name", &self.model_name)
            .finish_non_exhaustive()
    }
}

impl PredictionService {
    /// Build with the standard derivation rules.
    ///
    /// Schema slots whose kind the metadata left open take the kind the
    /// predictor declares for that column.
    pub fn new(predictor: Arc<dyn Predictor>, schema: Option<FeatureSchema>) -> Self {
        let schema = schema.map(|schema| {
            Arc::new(schema.resolve_kinds(|name| predictor.input_kind(name)))
        });
        Self {
            aligner: Aligner::new(schema.clone()),
            schema,
            deriver: FeatureDeriver::standard(),
            predictor,
            model_name: String::from("model"),
        }
    }

    /// Load the artifact and metadata named by `config`.
    ///
    /// Only the artifact is required; a missing or unusable metadata file
    /// leaves the service in pass-through mode.
    pub fn from_config(config: &ServeConfig) -> Result<Self, ServeError> {
        let model = PipelineModel::load(&config.model_path).map_err(|source| {
            ServeError::Configuration {
                path: config.model_path.clone(),
                source,
            }
        })?;
        info!(
            "loaded model {} ({} trees, {} encoded columns)",
            config.model_path.display(),
            model.num_trees(),
            model.encoder().width()
        );

        let schema = schema::load(&config.meta_path);
        match &schema {
            Some(schema) => info!("aligning requests to {} schema features", schema.len()),
            None => info!("no feature schema; requests pass through unaligned"),
        }

        let deriver = if config.derived_features {
            FeatureDeriver::standard()
        } else {
            FeatureDeriver::none()
        };

        Ok(Self::new(Arc::new(model), schema)
            .with_deriver(deriver)
            .with_model_name(config.model_name()))
    }

    /// Replace the deriver.
    pub fn with_deriver(mut self, deriver: FeatureDeriver) -> Self {
        self.deriver = deriver;
        self
    }

    /// Name reported by the health endpoint.
    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = name.into();
        self
    }

    #[inline]
    pub fn schema(&self) -> Option<&FeatureSchema> {
        self.schema.as_deref()
    }

    #[inline]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Predict from a raw request body.
    pub fn predict(&self, body: &[u8]) -> Result<f64, ServeError> {
        debug!("request {}: {} bytes", RequestStage::Received, body.len());
        self.finish(RawInput::from_slice(body))
    }

    /// Predict from an already decoded payload.
    pub fn predict_payload(&self, payload: &Value) -> Result<f64, ServeError> {
        debug!("request {}", RequestStage::Received);
        self.finish(RawInput::from_payload(payload))
    }

    /// Run validation, derivation and alignment without inferring.
    pub fn prepare(&self, payload: &Value) -> Result<AlignedRow, ServeError> {
        let mut stage = RequestStage::Received;
        self.prepare_input(RawInput::from_payload(payload), &mut stage)
    }

    fn finish(&self, input: Result<RawInput, PayloadError>) -> Result<f64, ServeError> {
        let mut stage = RequestStage::Received;
        let result = self.run(input, &mut stage);
        match &result {
            Ok(prediction) => debug!("request {}: {prediction}", RequestStage::Responded),
            Err(err) => warn!("request failed after {stage}: {err}"),
        }
        result
    }

    fn run(
        &self,
        input: Result<RawInput, PayloadError>,
        stage: &mut RequestStage,
    ) -> Result<f64, ServeError> {
        let row = self.prepare_input(input, stage)?;

        let prediction = self.predictor.predict(&row)?;
        *stage = RequestStage::Inferred;
        debug!("request {stage}: {prediction}");
        Ok(prediction)
    }

    fn prepare_input(
        &self,
        input: Result<RawInput, PayloadError>,
        stage: &mut RequestStage,
    ) -> Result<AlignedRow, ServeError> {
        let mut input = input?;
        *stage = RequestStage::Validated;
        debug!("request {stage}: {} features", input.len());

        let outcomes = self.deriver.derive(&mut input);
        *stage = RequestStage::Derived;
        debug!("request {stage}: {outcomes:?}");

        let row = self.aligner.align(&input)?;
        *stage = RequestStage::Aligned;
        debug!("request {stage}: {} columns", row.len());
        Ok(row)
    }

    /// Metadata endpoint body.
    pub fn meta(&self) -> MetaResponse {
        MetaResponse {
            available: self.schema.is_some(),
            schema: self.schema.as_deref().map(|schema| SchemaDetails {
                features: schema.names().map(str::to_string).collect(),
                feature_types: schema.kinds().collect(),
                training: schema.training().clone(),
            }),
        }
    }

    /// Liveness endpoint body.
    ///
    /// A service only exists once its artifact has loaded, so
    /// `model_loaded` is always true here.
    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "ok",
            model: self.model_name.clone(),
            model_loaded: true,
        }
    }
}
