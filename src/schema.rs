//! Schema store: the ordered feature list the trained model expects.
//!
//! The schema is read once at startup from the metadata file written next
//! to the model artifact. A missing or unusable file is not an error: the
//! service then runs in pass-through mode and aligns nothing.
//!
//! # Metadata format
//!
//! ```json
//! {
//!   "features": ["Brand", "Year", "Mileage"],
//!   "feature_types": ["categorical", "numeric", "numeric"],
//!   "r2": 0.91, "mae": 1520.4, "rmse": 2210.7,
//!   "test_size": 0.2,
//!   "note": "Car ID removed"
//! }
//! ```
//!
//! Only `features` is required. The evaluation numbers are informational
//! and never consulted by inference.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::value::{FeatureValue, Numeric};

// =============================================================================
// Feature kinds
// =============================================================================

/// Expected value kind of a schema slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    #[default]
    Numeric,
    Categorical,
}

impl FeatureKind {
    /// Fill value for a slot the request did not supply.
    ///
    /// Numeric slots get zero, not the training median, so an omitted
    /// numeric field silently shifts the prediction. Categorical slots get
    /// `Missing` so the artifact's own imputation decides what it means.
    pub fn default_value(&self) -> FeatureValue {
        match self {
            FeatureKind::Numeric => FeatureValue::Numeric(Numeric::Int(0)),
            FeatureKind::Categorical => FeatureValue::Missing,
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureKind::Numeric => f.write_str("numeric"),
            FeatureKind::Categorical => f.write_str("categorical"),
        }
    }
}

// =============================================================================
// Metadata file
// =============================================================================

/// On-disk metadata document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaFile {
    /// Ordered feature names.
    pub features: Vec<String>,
    /// Optional per-feature kinds, parallel to `features`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_types: Option<Vec<FeatureKind>>,
    #[serde(flatten)]
    pub training: TrainingReport,
}

/// Evaluation numbers recorded by the training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mae: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rmse: Option<f64>,
    /// Fraction of rows held out for evaluation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Reasons a metadata file is rejected.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid metadata JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("metadata lists no features")]
    NoFeatures,

    #[error("duplicate feature name: {0}")]
    DuplicateFeature(String),

    #[error("feature_types has {got} entries but there are {expected} features")]
    KindCountMismatch { expected: usize, got: usize },
}

// =============================================================================
// FeatureSchema
// =============================================================================

/// One slot of the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSlot {
    pub name: String,
    /// Declared kind; `None` when neither metadata nor model stated one.
    pub declared_kind: Option<FeatureKind>,
}

impl FeatureSlot {
    /// Effective kind. Undeclared slots are treated as numeric.
    #[inline]
    pub fn kind(&self) -> FeatureKind {
        self.declared_kind.unwrap_or_default()
    }
}

/// Ordered feature schema. Immutable once shared.
#[derive(Debug, Clone, Default)]
pub struct FeatureSchema {
    slots: Vec<FeatureSlot>,
    name_index: HashMap<String, usize>,
    training: TrainingReport,
}

impl FeatureSchema {
    /// Schema from names only (all kinds undeclared).
    pub fn from_names<I, S>(names: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slots = names
            .into_iter()
            .map(|name| FeatureSlot {
                name: name.into(),
                declared_kind: None,
            })
            .collect();
        Self::from_slots(slots)
    }

    /// Schema from `(name, kind)` pairs.
    pub fn typed<I, S>(features: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (S, FeatureKind)>,
        S: Into<String>,
    {
        let slots = features
            .into_iter()
            .map(|(name, kind)| FeatureSlot {
                name: name.into(),
                declared_kind: Some(kind),
            })
            .collect();
        Self::from_slots(slots)
    }

    fn from_slots(slots: Vec<FeatureSlot>) -> Result<Self, SchemaError> {
        if slots.is_empty() {
            return Err(SchemaError::NoFeatures);
        }
        let mut name_index = HashMap::with_capacity(slots.len());
        for (i, slot) in slots.iter().enumerate() {
            if name_index.insert(slot.name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateFeature(slot.name.clone()));
            }
        }
        Ok(Self {
            slots,
            name_index,
            training: TrainingReport::default(),
        })
    }

    /// Validate and convert a parsed metadata document.
    pub fn from_file(file: SchemaFile) -> Result<Self, SchemaError> {
        let schema = match file.feature_types {
            Some(kinds) => {
                if kinds.len() != file.features.len() {
                    return Err(SchemaError::KindCountMismatch {
                        expected: file.features.len(),
                        got: kinds.len(),
                    });
                }
                Self::typed(file.features.into_iter().zip(kinds))?
            }
            None => Self::from_names(file.features)?,
        };
        Ok(schema.with_training(file.training))
    }

    /// Attach the training report.
    pub fn with_training(mut self, training: TrainingReport) -> Self {
        self.training = training;
        self
    }

    /// Fill undeclared kinds from another source (typically the model's
    /// declared input columns). Declared kinds are never overridden.
    pub fn resolve_kinds<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<FeatureKind>,
    {
        for slot in &mut self.slots {
            if slot.declared_kind.is_none() {
                slot.declared_kind = lookup(&slot.name);
            }
        }
        self
    }

    /// Number of slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots in schema order.
    #[inline]
    pub fn slots(&self) -> &[FeatureSlot] {
        &self.slots
    }

    /// Feature names in schema order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.name.as_str())
    }

    /// Effective kinds in schema order.
    pub fn kinds(&self) -> impl Iterator<Item = FeatureKind> + '_ {
        self.slots.iter().map(FeatureSlot::kind)
    }

    /// Position of a feature by name.
    #[inline]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_index.get(name).copied()
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.name_index.contains_key(name)
    }

    /// Effective kind of a named feature.
    pub fn kind_of(&self, name: &str) -> Option<FeatureKind> {
        self.index_of(name).map(|i| self.slots[i].kind())
    }

    #[inline]
    pub fn training(&self) -> &TrainingReport {
        &self.training
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Read and validate a metadata file.
pub fn read(path: &Path) -> Result<FeatureSchema, SchemaError> {
    let text = fs::read_to_string(path)?;
    let file: SchemaFile = serde_json::from_str(&text)?;
    FeatureSchema::from_file(file)
}

/// Load the schema, falling back to pass-through mode on any problem.
///
/// A missing file is expected and logged at `info`; an unusable one is
/// logged at `warn`. Neither stops the service.
pub fn load(path: &Path) -> Option<FeatureSchema> {
    match read(path) {
        Ok(schema) => {
            info!(
                "loaded feature schema from {} ({} features)",
                path.display(),
                schema.len()
            );
            Some(schema)
        }
        Err(SchemaError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
            info!(
                "no schema metadata at {}; running in pass-through mode",
                path.display()
            );
            None
        }
        Err(e) => {
            warn!(
                "ignoring schema metadata at {}: {e}; running in pass-through mode",
                path.display()
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_meta(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_names_and_training_report() {
        let file = write_meta(
            r#"{"r2": 0.9, "mae": 1200.5, "rmse": 1800.0,
                "features": ["Brand", "Year"], "note": "Car ID removed"}"#,
        );
        let schema = load(file.path()).unwrap();

        assert_eq!(schema.names().collect::<Vec<_>>(), vec!["Brand", "Year"]);
        assert_eq!(schema.training().r2, Some(0.9));
        assert_eq!(schema.training().note.as_deref(), Some("Car ID removed"));
        assert!(schema.slots().iter().all(|s| s.declared_kind.is_none()));
    }

    #[test]
    fn loads_declared_kinds() {
        let file = write_meta(
            r#"{"features": ["Brand", "Year"], "feature_types": ["categorical", "numeric"]}"#,
        );
        let schema = load(file.path()).unwrap();
        assert_eq!(schema.kind_of("Brand"), Some(FeatureKind::Categorical));
        assert_eq!(schema.kind_of("Year"), Some(FeatureKind::Numeric));
    }

    #[test]
    fn missing_file_is_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("model_meta.json")).is_none());
    }

    #[test]
    fn malformed_file_is_pass_through() {
        let file = write_meta("{ not json");
        assert!(load(file.path()).is_none());

        let file = write_meta(r#"{"features": []}"#);
        assert!(load(file.path()).is_none());

        let file = write_meta(r#"{"r2": 0.5}"#);
        assert!(load(file.path()).is_none());
    }

    #[test]
    fn kind_count_mismatch_is_rejected() {
        let file = SchemaFile {
            features: vec!["a".into(), "b".into()],
            feature_types: Some(vec![FeatureKind::Numeric]),
            training: TrainingReport::default(),
        };
        assert!(matches!(
            FeatureSchema::from_file(file),
            Err(SchemaError::KindCountMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        assert!(matches!(
            FeatureSchema::from_names(["a", "b", "a"]),
            Err(SchemaError::DuplicateFeature(name)) if name == "a"
        ));
    }

    #[test]
    fn resolve_kinds_keeps_declared() {
        let schema = FeatureSchema::from_file(SchemaFile {
            features: vec!["Brand".into(), "Year".into(), "Color".into()],
            feature_types: None,
            training: TrainingReport::default(),
        })
        .unwrap()
        .resolve_kinds(|name| match name {
            "Brand" => Some(FeatureKind::Categorical),
            "Year" => Some(FeatureKind::Numeric),
            _ => None,
        });

        assert_eq!(schema.kind_of("Brand"), Some(FeatureKind::Categorical));
        assert_eq!(schema.kind_of("Year"), Some(FeatureKind::Numeric));
        // Unknown to both sources: numeric by default.
        assert_eq!(schema.slots()[2].declared_kind, None);
        assert_eq!(schema.kind_of("Color"), Some(FeatureKind::Numeric));

        let typed = FeatureSchema::typed([("Brand", FeatureKind::Numeric)])
            .unwrap()
            .resolve_kinds(|_| Some(FeatureKind::Categorical));
        assert_eq!(typed.kind_of("Brand"), Some(FeatureKind::Numeric));
    }

    #[test]
    fn default_values_by_kind() {
        assert_eq!(FeatureKind::Numeric.default_value(), FeatureValue::int(0));
        assert!(FeatureKind::Categorical.default_value().is_missing());
    }
}
