//! Column encoding: aligned row → dense model input.
//!
//! The encoder owns the preprocessing the model was trained behind:
//! numeric columns with median imputation, categorical columns with
//! most-frequent imputation and one-hot expansion.
//!
//! # Layout
//!
//! ```text
//! [ num_0 | num_1 | ... | cat_0 one-hot block | cat_1 one-hot block | ... ]
//! ```
//!
//! Numeric columns come first in declaration order, then one block per
//! categorical column with one slot per known category.

use std::collections::HashMap;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::align::AlignedRow;
use crate::error::InferenceError;
use crate::schema::FeatureKind;
use crate::value::FeatureValue;

/// Policy for a category never seen in training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCategory {
    /// Encode as an all-zero block.
    #[default]
    Ignore,
    /// Reject the row.
    Error,
}

/// Numeric input column.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericColumn {
    pub name: String,
    /// Replacement for missing values (training median).
    pub impute: f64,
}

/// Categorical input column.
#[derive(Debug, Clone)]
pub struct CategoricalColumn {
    pub name: String,
    categories: Vec<String>,
    index: HashMap<String, usize>,
    /// Replacement for missing values (training mode).
    impute: Option<String>,
    handle_unknown: UnknownCategory,
}

impl CategoricalColumn {
    pub fn new(
        name: impl Into<String>,
        categories: Vec<String>,
        impute: Option<String>,
        handle_unknown: UnknownCategory,
    ) -> Self {
        let index = categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        Self {
            name: name.into(),
            categories,
            index,
            impute,
            handle_unknown,
        }
    }

    #[inline]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    #[inline]
    pub fn impute(&self) -> Option<&str> {
        self.impute.as_deref()
    }

    #[inline]
    pub fn handle_unknown(&self) -> UnknownCategory {
        self.handle_unknown
    }

    /// Slot within this column's block, `None` for an ignored unknown.
    fn slot(&self, value: &FeatureValue) -> Result<Option<usize>, InferenceError> {
        let key = match value {
            FeatureValue::Missing => match &self.impute {
                Some(mode) => mode.clone(),
                None => return Ok(None),
            },
            FeatureValue::Invalid(raw) => {
                return Err(InferenceError::UnknownCategory {
                    column: self.name.clone(),
                    value: raw.to_string(),
                })
            }
            other => other.category_key().unwrap_or_default(),
        };
        match (self.index.get(&key), self.handle_unknown) {
            (Some(&i), _) => Ok(Some(i)),
            (None, UnknownCategory::Ignore) => Ok(None),
            (None, UnknownCategory::Error) => Err(InferenceError::UnknownCategory {
                column: self.name.clone(),
                value: key,
            }),
        }
    }
}

/// Maps an [`AlignedRow`] to the dense vector the forest consumes.
#[derive(Debug, Clone, Default)]
pub struct ColumnEncoder {
    numeric: Vec<NumericColumn>,
    categorical: Vec<CategoricalColumn>,
    width: usize,
}

impl ColumnEncoder {
    pub fn new(numeric: Vec<NumericColumn>, categorical: Vec<CategoricalColumn>) -> Self {
        let width = numeric.len() + categorical.iter().map(|c| c.categories.len()).sum::<usize>();
        Self {
            numeric,
            categorical,
            width,
        }
    }

    /// Encoded row width.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn numeric_columns(&self) -> &[NumericColumn] {
        &self.numeric
    }

    #[inline]
    pub fn categorical_columns(&self) -> &[CategoricalColumn] {
        &self.categorical
    }

    /// Input columns with their kinds, numeric first.
    pub fn input_kinds(&self) -> impl Iterator<Item = (&str, FeatureKind)> {
        self.numeric
            .iter()
            .map(|c| (c.name.as_str(), FeatureKind::Numeric))
            .chain(
                self.categorical
                    .iter()
                    .map(|c| (c.name.as_str(), FeatureKind::Categorical)),
            )
    }

    /// Kind of a named input column.
    pub fn kind_of(&self, name: &str) -> Option<FeatureKind> {
        self.input_kinds().find(|(n, _)| *n == name).map(|(_, k)| k)
    }

    /// Encode one row. Extra row columns are ignored.
    pub fn encode(&self, row: &AlignedRow) -> Result<Array1<f32>, InferenceError> {
        let mut out = Array1::<f32>::zeros(self.width);

        for (i, col) in self.numeric.iter().enumerate() {
            let value = row
                .get(&col.name)
                .ok_or_else(|| InferenceError::MissingColumn(col.name.clone()))?;
            out[i] = match value {
                FeatureValue::Numeric(n) => n.as_f64() as f32,
                FeatureValue::Missing => col.impute as f32,
                other => {
                    return Err(InferenceError::NonNumeric {
                        column: col.name.clone(),
                        value: other.to_string(),
                    })
                }
            };
        }

        let mut offset = self.numeric.len();
        for col in &self.categorical {
            let value = row
                .get(&col.name)
                .ok_or_else(|| InferenceError::MissingColumn(col.name.clone()))?;
            if let Some(slot) = col.slot(value)? {
                out[offset + slot] = 1.0;
            }
            offset += col.categories.len();
        }

        Ok(out)
    }
}
