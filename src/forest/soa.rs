//! Regression forest over SoA trees.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::trees::{Tree, TreeValidationError};

/// How per-tree outputs combine into one score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Average of tree outputs (bagged ensembles such as random forests).
    #[default]
    Mean,
    /// Sum of tree outputs (boosted ensembles).
    Sum,
}

/// Structural validation errors for [`Forest`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForestValidationError {
    #[error("forest has no trees")]
    NoTrees,

    #[error("tree {tree_idx}: {error}")]
    InvalidTree {
        tree_idx: usize,
        error: TreeValidationError,
    },
}

/// Single-output regression forest.
///
/// `score = base_score + aggregate(tree outputs)`.
#[derive(Debug, Clone)]
pub struct Forest {
    trees: Vec<Tree>,
    aggregation: Aggregation,
    base_score: f64,
}

impl Forest {
    pub fn new(aggregation: Aggregation) -> Self {
        Self {
            trees: Vec::new(),
            aggregation,
            base_score: 0.0,
        }
    }

    /// Set the constant added to every prediction.
    pub fn with_base_score(mut self, base_score: f64) -> Self {
        self.base_score = base_score;
        self
    }

    pub fn push_tree(&mut self, tree: Tree) {
        self.trees.push(tree);
    }

    #[inline]
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    #[inline]
    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn trees(&self) -> impl Iterator<Item = &Tree> {
        self.trees.iter()
    }

    /// Score one encoded row.
    pub fn predict_row(&self, features: ArrayView1<'_, f32>) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.predict_row(features)).sum();
        let combined = match self.aggregation {
            Aggregation::Sum => total,
            Aggregation::Mean if self.trees.is_empty() => 0.0,
            Aggregation::Mean => total / self.trees.len() as f64,
        };
        self.base_score + combined
    }

    /// Validate every tree against the encoded row width.
    pub fn validate(&self, n_features: usize) -> Result<(), ForestValidationError> {
        if self.trees.is_empty() {
            return Err(ForestValidationError::NoTrees);
        }
        for (tree_idx, tree) in self.trees.iter().enumerate() {
            tree.validate(n_features)
                .map_err(|error| ForestValidationError::InvalidTree { tree_idx, error })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trees::{SplitCondition, TreeBuilder};
    use ndarray::array;

    /// ```text
    ///        [0] col0 < threshold
    ///        /          \
    ///    [1] left       [2] right
    /// ```
    fn build_simple_tree(left_val: f64, right_val: f64, threshold: f32) -> Tree {
        let mut builder = TreeBuilder::new();
        builder.add_split(SplitCondition::new(0, threshold, true), 1, 2);
        builder.add_leaf(left_val);
        builder.add_leaf(right_val);
        builder.build()
    }

    #[test]
    fn single_tree() {
        let mut forest = Forest::new(Aggregation::Sum);
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5));

        assert_eq!(forest.predict_row(array![0.3f32].view()), 1.0);
        assert_eq!(forest.predict_row(array![0.7f32].view()), 2.0);
    }

    #[test]
    fn sum_aggregation() {
        let mut forest = Forest::new(Aggregation::Sum);
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5));
        forest.push_tree(build_simple_tree(0.5, 1.5, 0.5));

        assert_eq!(forest.predict_row(array![0.3f32].view()), 1.5);
        assert_eq!(forest.predict_row(array![0.7f32].view()), 3.5);
    }

    #[test]
    fn mean_aggregation() {
        let mut forest = Forest::new(Aggregation::Mean);
        forest.push_tree(build_simple_tree(10.0, 20.0, 0.5));
        forest.push_tree(build_simple_tree(30.0, 40.0, 0.5));

        assert_eq!(forest.predict_row(array![0.3f32].view()), 20.0);
        assert_eq!(forest.predict_row(array![0.7f32].view()), 30.0);
    }

    #[test]
    fn base_score_is_added_after_aggregation() {
        let mut forest = Forest::new(Aggregation::Mean).with_base_score(0.5);
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5));
        forest.push_tree(build_simple_tree(3.0, 4.0, 0.5));

        assert_eq!(forest.predict_row(array![0.3f32].view()), 2.5);
    }

    #[test]
    fn validation() {
        assert_eq!(
            Forest::new(Aggregation::Mean).validate(1),
            Err(ForestValidationError::NoTrees)
        );

        let mut forest = Forest::new(Aggregation::Mean);
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5));
        forest.push_tree(TreeBuilder::new().build());
        assert_eq!(forest.validate(1), Err(ForestValidationError::InvalidTree {
            tree_idx: 1,
            error: TreeValidationError::EmptyTree,
        }));
    }
}
