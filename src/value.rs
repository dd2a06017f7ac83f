//! Feature values and boundary coercion.
//!
//! Every value that enters the pipeline passes through [`FeatureValue::coerce`]
//! exactly once. After that point the rest of the crate works with the
//! closed sum type instead of raw JSON.
//!
//! # Coercion rules
//!
//! | JSON input | Result |
//! |------------|--------|
//! | integral number | `Numeric(Int)` |
//! | fractional number | `Numeric(Float)` |
//! | string parsing as a finite number | `Numeric` (integral → `Int`) |
//! | empty / whitespace string | `Missing` |
//! | any other string | `Categorical` (original text) |
//! | `null` | `Missing` |
//! | bool, array, object | `Invalid` |

use std::fmt;

use serde::ser::{Serialize, Serializer};
use serde_json::Value;

// =============================================================================
// Numeric
// =============================================================================

/// A coerced numeric value.
///
/// Integral values keep an integer representation so that they echo back
/// the way the caller wrote them (`2018`, not `2018.0`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Int(i64),
    Float(f64),
}

impl Numeric {
    /// Build from an `f64`, preferring `Int` when there is no fractional part.
    ///
    /// Returns `None` for NaN and infinities.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        // i64 range check: 2^63 is exactly representable as f64.
        if value.fract() == 0.0 && value >= -9.223_372_036_854_776e18 && value < 9.223_372_036_854_776e18 {
            Some(Numeric::Int(value as i64))
        } else {
            Some(Numeric::Float(value))
        }
    }

    /// Parse numeric text (`"45000"`, `" 1.6 "`, `"2.0e3"`).
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if let Ok(int) = trimmed.parse::<i64>() {
            return Some(Numeric::Int(int));
        }
        trimmed.parse::<f64>().ok().and_then(Self::from_f64)
    }

    #[inline]
    pub fn as_f64(&self) -> f64 {
        match *self {
            Numeric::Int(v) => v as f64,
            Numeric::Float(v) => v,
        }
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Numeric::Int(v) => write!(f, "{v}"),
            Numeric::Float(v) => write!(f, "{v}"),
        }
    }
}

impl Serialize for Numeric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Numeric::Int(v) => serializer.serialize_i64(v),
            Numeric::Float(v) => serializer.serialize_f64(v),
        }
    }
}

// =============================================================================
// FeatureValue
// =============================================================================

/// A single feature value after boundary coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    /// Number, from a JSON number or a numeric-looking string.
    Numeric(Numeric),
    /// Non-numeric text, kept verbatim for the artifact's categorical encoding.
    Categorical(String),
    /// Absent, `null`, or blank.
    Missing,
    /// A JSON shape that can never be a feature value (bool, array, object).
    Invalid(Value),
}

impl FeatureValue {
    /// Coerce one raw JSON value.
    pub fn coerce(raw: &Value) -> Self {
        match raw {
            Value::Null => FeatureValue::Missing,
            Value::Number(n) => {
                if let Some(int) = n.as_i64() {
                    FeatureValue::Numeric(Numeric::Int(int))
                } else {
                    match n.as_f64().and_then(Numeric::from_f64) {
                        Some(num) => FeatureValue::Numeric(num),
                        None => FeatureValue::Invalid(raw.clone()),
                    }
                }
            }
            Value::String(s) => Self::from_text(s),
            Value::Bool(_) | Value::Array(_) | Value::Object(_) => {
                FeatureValue::Invalid(raw.clone())
            }
        }
    }

    /// Coerce text: blank → `Missing`, numeric → `Numeric`, else `Categorical`.
    pub fn from_text(text: &str) -> Self {
        if text.trim().is_empty() {
            return FeatureValue::Missing;
        }
        match Numeric::parse(text) {
            Some(num) => FeatureValue::Numeric(num),
            None => FeatureValue::Categorical(text.to_string()),
        }
    }

    #[inline]
    pub fn int(value: i64) -> Self {
        FeatureValue::Numeric(Numeric::Int(value))
    }

    /// Numeric value from an `f64`; non-finite input becomes `Missing`.
    #[inline]
    pub fn float(value: f64) -> Self {
        Numeric::from_f64(value)
            .map(FeatureValue::Numeric)
            .unwrap_or(FeatureValue::Missing)
    }

    #[inline]
    pub fn categorical(value: impl Into<String>) -> Self {
        FeatureValue::Categorical(value.into())
    }

    /// The numeric payload, if any.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Numeric(n) => Some(n.as_f64()),
            _ => None,
        }
    }

    #[inline]
    pub fn is_missing(&self) -> bool {
        matches!(self, FeatureValue::Missing)
    }

    /// Canonical text used for category matching (`3`, `1.5`, `Toyota`).
    ///
    /// `None` for `Missing` and `Invalid`.
    pub fn category_key(&self) -> Option<String> {
        match self {
            FeatureValue::Numeric(n) => Some(n.to_string()),
            FeatureValue::Categorical(s) => Some(s.clone()),
            FeatureValue::Missing | FeatureValue::Invalid(_) => None,
        }
    }

    /// Short type label for error messages and logs.
    pub fn kind_label(&self) -> &'static str {
        match self {
            FeatureValue::Numeric(_) => "numeric",
            FeatureValue::Categorical(_) => "categorical",
            FeatureValue::Missing => "missing",
            FeatureValue::Invalid(_) => "invalid",
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Numeric(n) => write!(f, "{n}"),
            FeatureValue::Categorical(s) => write!(f, "{s:?}"),
            FeatureValue::Missing => f.write_str("null"),
            FeatureValue::Invalid(v) => write!(f, "{v}"),
        }
    }
}

impl Serialize for FeatureValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FeatureValue::Numeric(n) => n.serialize(serializer),
            FeatureValue::Categorical(s) => serializer.serialize_str(s),
            FeatureValue::Missing => serializer.serialize_none(),
            FeatureValue::Invalid(v) => v.serialize(serializer),
        }
    }
}
