//! Inference-ready model and the [`Predictor`] seam.
//!
//! The request pipeline only sees [`Predictor`]: one aligned row in, one
//! price out. [`PipelineModel`] is the production implementation, a
//! [`ColumnEncoder`] in front of a [`Forest`].
//!
//! # Example
//!
//! ```ignore
//! use price_serve::model::{PipelineModel, Predictor};
//!
//! let model = PipelineModel::load("model.json".as_ref())?;
//! let price = model.predict(&row)?;
//! ```

use std::path::Path;

use crate::align::AlignedRow;
use crate::error::InferenceError;
use crate::forest::Forest;
use crate::persist::{self, ArtifactError};
use crate::preprocess::ColumnEncoder;
use crate::schema::FeatureKind;

// =============================================================================
// Predictor
// =============================================================================

/// Anything that turns an aligned row into a prediction.
///
/// Implementations are shared across concurrent requests and must not
/// mutate themselves while predicting.
pub trait Predictor: Send + Sync {
    /// Predict one row.
    fn predict(&self, row: &AlignedRow) -> Result<f64, InferenceError>;

    /// Declared kind of an input column, if the model knows it.
    fn input_kind(&self, _name: &str) -> Option<FeatureKind> {
        None
    }
}

// =============================================================================
// OutputTransform
// =============================================================================

/// Transform applied to the raw forest score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputTransform {
    #[default]
    Identity,
    /// Inverse of a log-target fit.
    Exp,
}

impl OutputTransform {
    #[inline]
    pub fn apply(self, raw: f64) -> f64 {
        match self {
            OutputTransform::Identity => raw,
            OutputTransform::Exp => raw.exp(),
        }
    }
}

// =============================================================================
// PipelineModel
// =============================================================================

/// Preprocessing plus tree ensemble, loaded from one artifact.
#[derive(Debug, Clone)]
pub struct PipelineModel {
    encoder: ColumnEncoder,
    forest: Forest,
    output_transform: OutputTransform,
}

impl PipelineModel {
    /// Assemble a model. The forest is expected to be validated against
    /// `encoder.width()`.
    pub fn new(encoder: ColumnEncoder, forest: Forest, output_transform: OutputTransform) -> Self {
        Self {
            encoder,
            forest,
            output_transform,
        }
    }

    /// Load from an artifact file.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        persist::read_artifact(path)
    }

    /// Load from artifact bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ArtifactError> {
        persist::parse_artifact(bytes)
    }

    #[inline]
    pub fn encoder(&self) -> &ColumnEncoder {
        &self.encoder
    }

    #[inline]
    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    #[inline]
    pub fn output_transform(&self) -> OutputTransform {
        self.output_transform
    }

    #[inline]
    pub fn num_trees(&self) -> usize {
        self.forest.num_trees()
    }

    /// Input column names, numeric columns first.
    pub fn input_names(&self) -> impl Iterator<Item = &str> {
        self.encoder.input_kinds().map(|(name, _)| name)
    }
}

impl Predictor for PipelineModel {
    fn predict(&self, row: &AlignedRow) -> Result<f64, InferenceError> {
        let encoded = self.encoder.encode(row)?;
        let raw = self.forest.predict_row(encoded.view());
        let value = self.output_transform.apply(raw);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(InferenceError::NonFinite)
        }
    }

    fn input_kind(&self, name: &str) -> Option<FeatureKind> {
        self.encoder.kind_of(name)
    }
}
