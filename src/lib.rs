//! price-serve: schema-aligned tree-ensemble price prediction over HTTP.
//!
//! A request carries an arbitrary mapping of feature name to value. The
//! pipeline coerces each value once, derives computed features, aligns the
//! result to the ordered schema the model was trained on, and runs the
//! model's own preprocessing and forest to produce one price.
//!
//! ```text
//! body ─▶ RawInput ─▶ FeatureDeriver ─▶ Aligner ─▶ AlignedRow ─▶ PipelineModel ─▶ f64
//!                                          ▲                          ▲
//!                                   FeatureSchema              model artifact
//! ```

pub mod align;
pub mod config;
pub mod derive;
pub mod error;
pub mod forest;
pub mod http;
pub mod input;
pub mod model;
pub mod persist;
pub mod preprocess;
pub mod schema;
pub mod service;
pub mod testing;
pub mod trees;
pub mod value;

// Re-export approx for callers comparing predictions
pub use approx;

pub use align::{AlignError, AlignedRow, Aligner};
pub use config::ServeConfig;
pub use derive::{Clock, DerivationRule, FeatureDeriver, FixedClock, SystemClock};
pub use error::{InferenceError, ServeError};
pub use input::{PayloadError, RawInput};
pub use model::{OutputTransform, PipelineModel, Predictor};
pub use persist::ArtifactError;
pub use schema::{FeatureKind, FeatureSchema};
pub use service::PredictionService;
pub use value::{FeatureValue, Numeric};
