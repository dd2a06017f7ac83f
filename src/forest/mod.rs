//! Tree ensembles.

mod soa;

pub use soa::{Aggregation, Forest, ForestValidationError};
