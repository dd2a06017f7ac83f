//! Regression tree storage.

pub mod node;
pub mod soa;

/// Index of a node within one tree's arrays. The root is `0`.
pub type NodeId = u32;

pub use node::SplitCondition;
pub use soa::{Tree, TreeBuilder, TreeValidationError};
