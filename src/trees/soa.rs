//! Structure-of-Arrays tree storage.

use ndarray::ArrayView1;

use super::node::SplitCondition;
use super::NodeId;

/// Structural validation errors for [`Tree`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeValidationError {
    #[error("tree has no nodes")]
    EmptyTree,

    #[error("node {node} has {side} child {child} but the tree has {n_nodes} nodes")]
    ChildOutOfBounds {
        node: NodeId,
        side: &'static str,
        child: NodeId,
        n_nodes: usize,
    },

    #[error("node {node} references itself as a child")]
    SelfLoop { node: NodeId },

    #[error("cycle detected at node {node}")]
    CycleDetected { node: NodeId },

    #[error("node {node} is reachable by more than one path")]
    DuplicateVisit { node: NodeId },

    #[error("node {node} is unreachable from the root")]
    UnreachableNode { node: NodeId },

    #[error("node {node} splits on column {feature} but rows have {n_features} columns")]
    SplitFeatureOutOfRange {
        node: NodeId,
        feature: u32,
        n_features: usize,
    },
}

/// Regression tree in flat per-node arrays.
///
/// Child indices are local to this tree (0 = root). Leaf nodes carry a
/// value; split nodes carry a [`SplitCondition`].
#[derive(Debug, Clone)]
pub struct Tree {
    /// Split column per node
    split_indices: Box<[u32]>,
    /// Split threshold per node
    split_thresholds: Box<[f32]>,
    /// Left child per node (only valid for split nodes)
    left_children: Box<[u32]>,
    /// Right child per node (only valid for split nodes)
    right_children: Box<[u32]>,
    /// NaN direction per node (true = left)
    default_left: Box<[bool]>,
    is_leaf: Box<[bool]>,
    /// Leaf value per node (only valid for leaf nodes)
    leaf_values: Box<[f64]>,
}

impl Tree {
    /// Number of nodes in this tree.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    #[inline]
    pub fn is_leaf(&self, node: NodeId) -> bool {
        self.is_leaf[node as usize]
    }

    #[inline]
    pub fn split_index(&self, node: NodeId) -> u32 {
        self.split_indices[node as usize]
    }

    #[inline]
    pub fn split_threshold(&self, node: NodeId) -> f32 {
        self.split_thresholds[node as usize]
    }

    #[inline]
    pub fn left_child(&self, node: NodeId) -> NodeId {
        self.left_children[node as usize]
    }

    #[inline]
    pub fn right_child(&self, node: NodeId) -> NodeId {
        self.right_children[node as usize]
    }

    #[inline]
    pub fn default_left(&self, node: NodeId) -> bool {
        self.default_left[node as usize]
    }

    #[inline]
    pub fn leaf_value(&self, node: NodeId) -> f64 {
        self.leaf_values[node as usize]
    }

    /// Split condition of a split node.
    #[inline]
    pub fn condition(&self, node: NodeId) -> SplitCondition {
        SplitCondition::new(
            self.split_index(node),
            self.split_threshold(node),
            self.default_left(node),
        )
    }

    /// Largest split column referenced, if the tree has any split.
    pub fn max_split_index(&self) -> Option<u32> {
        (0..self.num_nodes() as NodeId)
            .filter(|&n| !self.is_leaf(n))
            .map(|n| self.split_index(n))
            .max()
    }

    /// Walk from the root to a leaf and return its node id.
    ///
    /// Columns beyond the end of `features` read as NaN.
    pub fn traverse_to_leaf(&self, features: ArrayView1<'_, f32>) -> NodeId {
        let mut node: NodeId = 0;

        while !self.is_leaf(node) {
            let fvalue = features
                .get(self.split_index(node) as usize)
                .copied()
                .unwrap_or(f32::NAN);

            node = if self.condition(node).go_left(fvalue) {
                self.left_child(node)
            } else {
                self.right_child(node)
            };
        }

        node
    }

    /// Leaf value reached by one encoded row.
    #[inline]
    pub fn predict_row(&self, features: ArrayView1<'_, f32>) -> f64 {
        self.leaf_value(self.traverse_to_leaf(features))
    }

    /// Check structural invariants: non-empty, in-bounds children, every
    /// node reachable exactly once from the root, and split columns below
    /// `n_features`.
    pub fn validate(&self, n_features: usize) -> Result<(), TreeValidationError> {
        let n_nodes = self.num_nodes();
        if n_nodes == 0 {
            return Err(TreeValidationError::EmptyTree);
        }

        // Iterative DFS with color marking.
        // 0 = unvisited, 1 = visiting, 2 = done
        let mut color = vec![0u8; n_nodes];
        let mut stack: Vec<(NodeId, bool)> = vec![(0, false)];

        while let Some((node, finished)) = stack.pop() {
            let idx = node as usize;
            if finished {
                color[idx] = 2;
                continue;
            }
            match color[idx] {
                0 => {}
                1 => return Err(TreeValidationError::CycleDetected { node }),
                _ => return Err(TreeValidationError::DuplicateVisit { node }),
            }
            color[idx] = 1;
            stack.push((node, true));

            if self.is_leaf(node) {
                continue;
            }

            let feature = self.split_index(node);
            if feature as usize >= n_features {
                return Err(TreeValidationError::SplitFeatureOutOfRange {
                    node,
                    feature,
                    n_features,
                });
            }

            let left = self.left_child(node);
            let right = self.right_child(node);
            if left == node || right == node {
                return Err(TreeValidationError::SelfLoop { node });
            }
            for (side, child) in [("left", left), ("right", right)] {
                if child as usize >= n_nodes {
                    return Err(TreeValidationError::ChildOutOfBounds {
                        node,
                        side,
                        child,
                        n_nodes,
                    });
                }
            }

            stack.push((right, false));
            stack.push((left, false));
        }

        match color.iter().position(|&c| c == 0) {
            Some(i) => Err(TreeValidationError::UnreachableNode { node: i as NodeId }),
            None => Ok(()),
        }
    }
}

/// Builder for [`Tree`] from individual nodes.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    split_indices: Vec<u32>,
    split_thresholds: Vec<f32>,
    left_children: Vec<u32>,
    right_children: Vec<u32>,
    default_left: Vec<bool>,
    is_leaf: Vec<bool>,
    leaf_values: Vec<f64>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a split node. Returns the node index.
    pub fn add_split(&mut self, condition: SplitCondition, left: NodeId, right: NodeId) -> NodeId {
        let idx = self.is_leaf.len() as NodeId;
        self.split_indices.push(condition.feature_index);
        self.split_thresholds.push(condition.threshold);
        self.left_children.push(left);
        self.right_children.push(right);
        self.default_left.push(condition.default_left);
        self.is_leaf.push(false);
        self.leaf_values.push(0.0);
        idx
    }

    /// Add a leaf node. Returns the node index.
    pub fn add_leaf(&mut self, value: f64) -> NodeId {
        let idx = self.is_leaf.len() as NodeId;
        self.split_indices.push(0);
        self.split_thresholds.push(0.0);
        self.left_children.push(0);
        self.right_children.push(0);
        self.default_left.push(false);
        self.is_leaf.push(true);
        self.leaf_values.push(value);
        idx
    }

    /// Number of nodes added so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.is_leaf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.is_leaf.is_empty()
    }

    pub fn build(self) -> Tree {
        Tree {
            split_indices: self.split_indices.into_boxed_slice(),
            split_thresholds: self.split_thresholds.into_boxed_slice(),
            left_children: self.left_children.into_boxed_slice(),
            right_children: self.right_children.into_boxed_slice(),
            default_left: self.default_left.into_boxed_slice(),
            is_leaf: self.is_leaf.into_boxed_slice(),
            leaf_values: self.leaf_values.into_boxed_slice(),
        }
    }
}
