//! Testing utilities for price-serve.
//!
//! Fixture builders and assertion helpers shared by unit tests and the
//! integration tests under `tests/`.
//!
//! ```ignore
//! use price_serve::testing::{car_price_service, assert_prediction_eq};
//!
//! let svc = car_price_service(2024);
//! assert_prediction_eq(svc.predict(body)?, 16500.0, "toyota");
//! ```

use std::sync::Arc;

use crate::derive::{FeatureDeriver, FixedClock};
use crate::forest::{Aggregation, Forest};
use crate::model::{OutputTransform, PipelineModel};
use crate::preprocess::{CategoricalColumn, ColumnEncoder, NumericColumn, UnknownCategory};
use crate::schema::{FeatureKind, FeatureSchema, TrainingReport};
use crate::service::PredictionService;
use crate::trees::{SplitCondition, Tree, TreeBuilder};

// =============================================================================
// Constants
// =============================================================================

/// Relative tolerance for price comparisons.
pub const DEFAULT_RELATIVE_TOLERANCE: f64 = 1e-9;

/// Features of the car fixture, in schema order.
pub const CAR_FEATURES: [&str; 5] = ["Year", "Mileage", "Age", "Mileage_log", "Brand"];

/// Brands the car fixture was "trained" on.
pub const CAR_BRANDS: [&str; 3] = ["BMW", "Ford", "Toyota"];

// =============================================================================
// Car price fixture
// =============================================================================

/// Encoded layout: `[Year, Mileage, Age, Mileage_log, BMW, Ford, Toyota]`.
///
/// ```text
/// tree 0: Age < 5.5 ? 25000 : 15000
/// tree 1: BMW < 0.5 ? 18000 : 30000
/// price = mean(tree 0, tree 1)
/// ```
pub fn car_price_model() -> PipelineModel {
    let encoder = ColumnEncoder::new(
        vec![
            NumericColumn { name: "Year".into(), impute: 2017.0 },
            NumericColumn { name: "Mileage".into(), impute: 52000.0 },
            NumericColumn { name: "Age".into(), impute: 7.0 },
            NumericColumn { name: "Mileage_log".into(), impute: 10.86 },
        ],
        vec![CategoricalColumn::new(
            "Brand",
            CAR_BRANDS.iter().map(|b| b.to_string()).collect(),
            Some("Toyota".into()),
            UnknownCategory::Ignore,
        )],
    );

    let mut forest = Forest::new(Aggregation::Mean);
    forest.push_tree(stump(2, 5.5, 25000.0, 15000.0));
    forest.push_tree(stump(4, 0.5, 18000.0, 30000.0));

    PipelineModel::new(encoder, forest, OutputTransform::Identity)
}

/// One split on `column`, left when below `threshold`.
pub fn stump(column: u32, threshold: f32, left: f64, right: f64) -> Tree {
    let mut builder = TreeBuilder::new();
    builder.add_split(SplitCondition::new(column, threshold, true), 1, 2);
    builder.add_leaf(left);
    builder.add_leaf(right);
    builder.build()
}

/// Typed schema matching [`car_price_model`], with a training report.
pub fn car_price_schema() -> FeatureSchema {
    let kinds = [
        FeatureKind::Numeric,
        FeatureKind::Numeric,
        FeatureKind::Numeric,
        FeatureKind::Numeric,
        FeatureKind::Categorical,
    ];
    FeatureSchema::typed(CAR_FEATURES.into_iter().zip(kinds))
        .unwrap_or_else(|e| panic!("car schema is valid: {e}"))
        .with_training(TrainingReport {
            r2: Some(0.91),
            mae: Some(1520.4),
            rmse: Some(2210.7),
            test_size: Some(0.2),
            note: Some("Car ID removed".into()),
        })
}

/// Service over the car fixture with the clock pinned to `year`.
pub fn car_price_service(year: i32) -> PredictionService {
    PredictionService::new(Arc::new(car_price_model()), Some(car_price_schema()))
        .with_deriver(FeatureDeriver::standard().with_clock(FixedClock(year)))
        .with_model_name("model.json")
}

// =============================================================================
// Assertions
// =============================================================================

/// Assert two predictions are equal within [`DEFAULT_RELATIVE_TOLERANCE`].
///
/// # Panics
///
/// Panics with `context` when they differ.
pub fn assert_prediction_eq(actual: f64, expected: f64, context: &str) {
    assert!(
        approx::relative_eq!(actual, expected, max_relative = DEFAULT_RELATIVE_TOLERANCE),
        "{context}: prediction {actual} != expected {expected}"
    );
}

/// Assert every pair of predictions is equal, reporting the first mismatch.
pub fn assert_predictions_eq(actual: &[f64], expected: &[f64], context: &str) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "{context}: got {} predictions, expected {}",
        actual.len(),
        expected.len()
    );
    for (i, (&a, &e)) in actual.iter().zip(expected).enumerate() {
        assert_prediction_eq(a, e, &format!("{context}[{i}]"));
    }
}
