//! Test case loading utilities for integration tests.
//!
//! For assertion helpers and in-memory fixtures, use `price_serve::testing`.

#![allow(dead_code)]

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

#[allow(unused_imports)]
pub use price_serve::testing::{assert_prediction_eq, assert_predictions_eq};

// =============================================================================
// Test Case Loading
// =============================================================================

/// Base directory for test cases.
pub fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/test-cases")
}

/// Directory for the car price fixture.
pub fn car_price_dir() -> PathBuf {
    test_cases_dir().join("car_price")
}

/// Load a JSON file and deserialize it.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> T {
    let file =
        File::open(path).unwrap_or_else(|e| panic!("Failed to open {}: {e}", path.display()));
    serde_json::from_reader(file)
        .unwrap_or_else(|e| panic!("Failed to parse {}: {e}", path.display()))
}

// =============================================================================
// Prediction Cases
// =============================================================================

/// One request and the price it should produce.
#[derive(Debug, Deserialize)]
pub struct PredictionCase {
    pub name: String,
    pub payload: serde_json::Value,
    pub expected: f64,
}

/// A file of prediction cases evaluated at a pinned year.
#[derive(Debug, Deserialize)]
pub struct PredictionCases {
    pub current_year: i32,
    pub cases: Vec<PredictionCase>,
}

/// Load `cases.json` from the car price fixture.
pub fn car_price_cases() -> PredictionCases {
    load_json(&car_price_dir().join("cases.json"))
}
