//! Conversions between artifact schema types and runtime types.
//!
//! Loading goes through `TryFrom` and validates everything the runtime
//! relies on: array lengths, leaf markers, finite parameters, category
//! lists and tree structure. Writing goes through `From` and is lossless.

use std::collections::HashSet;

use crate::forest::{Forest, ForestValidationError};
use crate::model::{OutputTransform, PipelineModel};
use crate::preprocess::{CategoricalColumn, ColumnEncoder, NumericColumn};
use crate::trees::{SplitCondition, Tree, TreeBuilder};

use super::schema::{
    ArtifactSchema, ColumnSchema, ForestSchema, OutputTransformSchema, TreeSchema, NO_CHILD,
    UNDEFINED_FEATURE,
};

/// Reasons an artifact document cannot become a runtime model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    #[error("artifact declares no input columns")]
    NoColumns,

    #[error("duplicate input column '{0}'")]
    DuplicateColumn(String),

    #[error("column '{0}' lists no categories")]
    EmptyCategories(String),

    #[error("column '{column}': duplicate category {value:?}")]
    DuplicateCategory { column: String, value: String },

    #[error("column '{column}': imputation value {value:?} is not a known category")]
    ImputeNotACategory { column: String, value: String },

    #[error("column '{0}': non-finite imputation value")]
    NonFiniteImpute(String),

    #[error("tree {tree}: '{field}' has {actual} entries, expected {expected}")]
    LengthMismatch {
        tree: usize,
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("tree {tree}, node {node}: only one child is marked as absent")]
    HalfLeaf { tree: usize, node: usize },

    #[error("tree {tree}, node {node}: invalid child index {child}")]
    InvalidChild { tree: usize, node: usize, child: i64 },

    #[error("tree {tree}, node {node}: invalid split column {feature}")]
    InvalidSplitIndex { tree: usize, node: usize, feature: i64 },

    #[error("tree {tree}, node {node}: non-finite {what}")]
    NonFinite {
        tree: usize,
        node: usize,
        what: &'static str,
    },

    #[error("non-finite base score")]
    NonFiniteBaseScore,

    #[error(transparent)]
    Forest(#[from] ForestValidationError),
}

// =============================================================================
// Output transform
// =============================================================================

impl From<OutputTransformSchema> for OutputTransform {
    fn from(schema: OutputTransformSchema) -> Self {
        match schema {
            OutputTransformSchema::Identity => OutputTransform::Identity,
            OutputTransformSchema::Exp => OutputTransform::Exp,
        }
    }
}

impl From<OutputTransform> for OutputTransformSchema {
    fn from(transform: OutputTransform) -> Self {
        match transform {
            OutputTransform::Identity => OutputTransformSchema::Identity,
            OutputTransform::Exp => OutputTransformSchema::Exp,
        }
    }
}

// =============================================================================
// Columns
// =============================================================================

impl TryFrom<Vec<ColumnSchema>> for ColumnEncoder {
    type Error = ConversionError;

    fn try_from(columns: Vec<ColumnSchema>) -> Result<Self, Self::Error> {
        if columns.is_empty() {
            return Err(ConversionError::NoColumns);
        }

        let mut seen = HashSet::new();
        let mut numeric = Vec::new();
        let mut categorical = Vec::new();

        for column in columns {
            if !seen.insert(column.name().to_string()) {
                return Err(ConversionError::DuplicateColumn(column.name().to_string()));
            }
            match column {
                ColumnSchema::Numeric { name, impute } => {
                    if !impute.is_finite() {
                        return Err(ConversionError::NonFiniteImpute(name));
                    }
                    numeric.push(NumericColumn { name, impute });
                }
                ColumnSchema::Categorical {
                    name,
                    categories,
                    impute,
                    handle_unknown,
                } => {
                    if categories.is_empty() {
                        return Err(ConversionError::EmptyCategories(name));
                    }
                    let mut levels = HashSet::new();
                    if let Some(dup) = categories.iter().find(|c| !levels.insert(c.as_str())) {
                        return Err(ConversionError::DuplicateCategory {
                            column: name,
                            value: dup.clone(),
                        });
                    }
                    if let Some(mode) = &impute {
                        if !levels.contains(mode.as_str()) {
                            return Err(ConversionError::ImputeNotACategory {
                                column: name,
                                value: mode.clone(),
                            });
                        }
                    }
                    categorical.push(CategoricalColumn::new(
                        name,
                        categories,
                        impute,
                        handle_unknown,
                    ));
                }
            }
        }

        Ok(ColumnEncoder::new(numeric, categorical))
    }
}

impl From<&ColumnEncoder> for Vec<ColumnSchema> {
    fn from(encoder: &ColumnEncoder) -> Self {
        let numeric = encoder
            .numeric_columns()
            .iter()
            .map(|c| ColumnSchema::Numeric {
                name: c.name.clone(),
                impute: c.impute,
            });
        let categorical = encoder
            .categorical_columns()
            .iter()
            .map(|c| ColumnSchema::Categorical {
                name: c.name.clone(),
                categories: c.categories().to_vec(),
                impute: c.impute().map(str::to_string),
                handle_unknown: c.handle_unknown(),
            });
        numeric.chain(categorical).collect()
    }
}

// =============================================================================
// Trees
// =============================================================================

/// Convert one tree. `tree` is its position, for error messages.
fn tree_from_schema(tree: usize, schema: TreeSchema) -> Result<Tree, ConversionError> {
    let n_nodes = schema.num_nodes();
    let check_len = |field: &'static str, actual: usize| {
        if actual == n_nodes {
            Ok(())
        } else {
            Err(ConversionError::LengthMismatch {
                tree,
                field,
                expected: n_nodes,
                actual,
            })
        }
    };
    check_len("children_right", schema.children_right.len())?;
    check_len("split_indices", schema.split_indices.len())?;
    check_len("thresholds", schema.thresholds.len())?;
    check_len("leaf_values", schema.leaf_values.len())?;
    if let Some(default_left) = &schema.default_left {
        check_len("default_left", default_left.len())?;
    }

    let child_id = |node: usize, child: i64| {
        u32::try_from(child).map_err(|_| ConversionError::InvalidChild { tree, node, child })
    };

    let mut builder = TreeBuilder::new();
    for node in 0..n_nodes {
        let (left, right) = (schema.children_left[node], schema.children_right[node]);
        match (left == NO_CHILD, right == NO_CHILD) {
            (true, true) => {
                let value = schema.leaf_values[node];
                if !value.is_finite() {
                    return Err(ConversionError::NonFinite {
                        tree,
                        node,
                        what: "leaf value",
                    });
                }
                builder.add_leaf(value);
            }
            (false, false) => {
                let feature = schema.split_indices[node];
                let feature_index = u32::try_from(feature)
                    .map_err(|_| ConversionError::InvalidSplitIndex { tree, node, feature })?;
                let threshold = schema.thresholds[node];
                if threshold.is_nan() {
                    return Err(ConversionError::NonFinite {
                        tree,
                        node,
                        what: "threshold",
                    });
                }
                let default_left = schema
                    .default_left
                    .as_ref()
                    .map_or(true, |flags| flags[node]);
                builder.add_split(
                    SplitCondition::new(feature_index, threshold as f32, default_left),
                    child_id(node, left)?,
                    child_id(node, right)?,
                );
            }
            _ => return Err(ConversionError::HalfLeaf { tree, node }),
        }
    }

    Ok(builder.build())
}

impl From<&Tree> for TreeSchema {
    fn from(tree: &Tree) -> Self {
        let n_nodes = tree.num_nodes();
        let mut schema = TreeSchema {
            split_indices: Vec::with_capacity(n_nodes),
            thresholds: Vec::with_capacity(n_nodes),
            children_left: Vec::with_capacity(n_nodes),
            children_right: Vec::with_capacity(n_nodes),
            default_left: None,
            leaf_values: Vec::with_capacity(n_nodes),
        };
        let mut default_left = Vec::with_capacity(n_nodes);

        for node in 0..n_nodes as u32 {
            if tree.is_leaf(node) {
                schema.split_indices.push(UNDEFINED_FEATURE);
                schema.thresholds.push(0.0);
                schema.children_left.push(NO_CHILD);
                schema.children_right.push(NO_CHILD);
                schema.leaf_values.push(tree.leaf_value(node));
                default_left.push(true);
            } else {
                let cond = tree.condition(node);
                schema.split_indices.push(i64::from(cond.feature_index));
                schema.thresholds.push(f64::from(cond.threshold));
                schema.children_left.push(i64::from(tree.left_child(node)));
                schema.children_right.push(i64::from(tree.right_child(node)));
                schema.leaf_values.push(0.0);
                default_left.push(cond.default_left);
            }
        }
        schema.default_left = Some(default_left);
        schema
    }
}

// =============================================================================
// Forest
// =============================================================================

impl TryFrom<ForestSchema> for Forest {
    type Error = ConversionError;

    fn try_from(schema: ForestSchema) -> Result<Self, Self::Error> {
        if !schema.base_score.is_finite() {
            return Err(ConversionError::NonFiniteBaseScore);
        }
        let mut forest = Forest::new(schema.aggregation).with_base_score(schema.base_score);
        for (idx, tree) in schema.trees.into_iter().enumerate() {
            forest.push_tree(tree_from_schema(idx, tree)?);
        }
        Ok(forest)
    }
}

impl From<&Forest> for ForestSchema {
    fn from(forest: &Forest) -> Self {
        ForestSchema {
            aggregation: forest.aggregation(),
            base_score: forest.base_score(),
            trees: forest.trees().map(TreeSchema::from).collect(),
        }
    }
}

// =============================================================================
// Model
// =============================================================================

impl TryFrom<ArtifactSchema> for PipelineModel {
    type Error = ConversionError;

    fn try_from(schema: ArtifactSchema) -> Result<Self, Self::Error> {
        let encoder = ColumnEncoder::try_from(schema.features)?;
        let forest = Forest::try_from(schema.forest)?;
        forest.validate(encoder.width())?;
        Ok(PipelineModel::new(
            encoder,
            forest,
            schema.output_transform.into(),
        ))
    }
}

impl From<&PipelineModel> for ArtifactSchema {
    fn from(model: &PipelineModel) -> Self {
        ArtifactSchema {
            format_version: super::FORMAT_VERSION,
            features: model.encoder().into(),
            forest: model.forest().into(),
            output_transform: model.output_transform().into(),
        }
    }
}
