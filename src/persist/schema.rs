//! Schema types for the model artifact.
//!
//! These mirror the JSON document on disk and stay separate from the
//! runtime types in [`crate::model`], [`crate::preprocess`] and
//! [`crate::forest`], so the format can be validated on load and evolve
//! on its own.

use serde::{Deserialize, Serialize};

use crate::forest::Aggregation;
use crate::preprocess::UnknownCategory;

/// Child index marking "no child" (the node is a leaf).
pub const NO_CHILD: i64 = -1;

/// Split column written for leaves.
pub const UNDEFINED_FEATURE: i64 = -2;

/// Output transform applied to the raw forest score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputTransformSchema {
    /// Raw score.
    #[default]
    Identity,
    /// `exp(score)`, for models trained on a log target.
    Exp,
}

/// One declared input column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnSchema {
    Numeric {
        name: String,
        /// Training median.
        #[serde(default)]
        impute: f64,
    },
    Categorical {
        name: String,
        /// Known levels, one encoded slot each.
        categories: Vec<String>,
        /// Training mode.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        impute: Option<String>,
        #[serde(default)]
        handle_unknown: UnknownCategory,
    },
}

impl ColumnSchema {
    pub fn name(&self) -> &str {
        match self {
            ColumnSchema::Numeric { name, .. } | ColumnSchema::Categorical { name, .. } => name,
        }
    }
}

/// Tree schema (SoA layout, one entry per node in every array).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSchema {
    /// Encoded column each split node tests. Ignored for leaves.
    pub split_indices: Vec<i64>,
    /// Split thresholds. Ignored for leaves.
    pub thresholds: Vec<f64>,
    /// Left child per node ([`NO_CHILD`] for leaves).
    pub children_left: Vec<i64>,
    /// Right child per node ([`NO_CHILD`] for leaves).
    pub children_right: Vec<i64>,
    /// NaN direction per node. Absent means all-left.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_left: Option<Vec<bool>>,
    /// Output per node. Only leaf entries are read.
    pub leaf_values: Vec<f64>,
}

impl TreeSchema {
    /// Node count, taken from `children_left`.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.children_left.len()
    }
}

/// Forest schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestSchema {
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<TreeSchema>,
}

/// Full artifact document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSchema {
    pub format_version: u32,
    /// Input columns in declaration order.
    pub features: Vec<ColumnSchema>,
    pub forest: ForestSchema,
    #[serde(default)]
    pub output_transform: OutputTransformSchema,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn columns_are_tagged_by_kind() {
        let cols: Vec<ColumnSchema> = serde_json::from_value(json!([
            {"kind": "numeric", "name": "Year", "impute": 2017},
            {"kind": "categorical", "name": "Brand", "categories": ["BMW", "Ford"]}
        ]))
        .unwrap();

        assert_eq!(
            cols[0],
            ColumnSchema::Numeric {
                name: "Year".into(),
                impute: 2017.0
            }
        );
        assert_eq!(
            cols[1],
            ColumnSchema::Categorical {
                name: "Brand".into(),
                categories: vec!["BMW".into(), "Ford".into()],
                impute: None,
                handle_unknown: UnknownCategory::Ignore,
            }
        );
        assert_eq!(cols[1].name(), "Brand");
    }

    #[test]
    fn optional_fields_take_defaults() {
        let artifact: ArtifactSchema = serde_json::from_value(json!({
            "format_version": 1,
            "features": [{"kind": "numeric", "name": "x"}],
            "forest": {"trees": [{
                "split_indices": [-2],
                "thresholds": [0.0],
                "children_left": [-1],
                "children_right": [-1],
                "leaf_values": [3.5]
            }]}
        }))
        .unwrap();

        assert_eq!(artifact.output_transform, OutputTransformSchema::Identity);
        assert_eq!(artifact.forest.aggregation, Aggregation::Mean);
        assert_eq!(artifact.forest.base_score, 0.0);
        assert_eq!(artifact.forest.trees[0].default_left, None);
        assert_eq!(artifact.forest.trees[0].num_nodes(), 1);
    }

    #[test]
    fn unknown_column_kind_is_rejected() {
        let parsed: Result<ColumnSchema, _> =
            serde_json::from_value(json!({"kind": "text", "name": "x"}));
        assert!(parsed.is_err());
    }
}
