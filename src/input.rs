//! Request payload normalisation.
//!
//! Clients send either `{"features": {...}}` or the feature mapping itself.
//! [`RawInput::from_payload`] accepts both shapes, coerces every value once
//! and keeps arrival order.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::value::FeatureValue;

/// Key under which wrapped payloads carry their features.
pub const FEATURES_KEY: &str = "features";

/// Structural problems with a request payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("request body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("'features' must be a JSON object, got {0}")]
    FeaturesNotAnObject(&'static str),

    #[error("no features supplied")]
    Empty,
}

/// JSON type name for error messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Unordered-by-contract, order-preserving mapping of feature name to value.
///
/// Built fresh per request. The deriver may add keys; nothing removes them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawInput {
    entries: Vec<(String, FeatureValue)>,
    index: HashMap<String, usize>,
}

impl RawInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a request body.
    pub fn from_slice(body: &[u8]) -> Result<Self, PayloadError> {
        let payload: Value =
            serde_json::from_slice(body).map_err(|e| PayloadError::InvalidJson(e.to_string()))?;
        Self::from_payload(&payload)
    }

    /// Extract and coerce the feature mapping from a decoded payload.
    ///
    /// A `features` key selects the wrapped shape; otherwise the whole
    /// object is the mapping.
    pub fn from_payload(payload: &Value) -> Result<Self, PayloadError> {
        let object = payload
            .as_object()
            .ok_or_else(|| PayloadError::NotAnObject(json_kind(payload)))?;

        let features = match object.get(FEATURES_KEY) {
            Some(Value::Object(inner)) => inner,
            Some(other) => return Err(PayloadError::FeaturesNotAnObject(json_kind(other))),
            None => object,
        };

        if features.is_empty() {
            return Err(PayloadError::Empty);
        }
        Ok(Self::from_map(features))
    }

    /// Coerce every value of a JSON object.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        map.iter()
            .map(|(k, v)| (k.clone(), FeatureValue::coerce(v)))
            .collect()
    }

    /// Insert or replace a value. New keys are appended.
    pub fn insert(&mut self, name: impl Into<String>, value: FeatureValue) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, value));
            }
        }
    }

    /// Value for a key, including explicit `Missing`.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    /// Value for a key, treating `Missing` as absent.
    #[inline]
    pub fn supplied(&self, name: &str) -> Option<&FeatureValue> {
        self.get(name).filter(|v| !v.is_missing())
    }

    /// Whether the caller supplied a usable (non-missing) value.
    #[inline]
    pub fn is_supplied(&self, name: &str) -> bool {
        self.supplied(name).is_some()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<S: Into<String>> FromIterator<(S, FeatureValue)> for RawInput {
    fn from_iter<I: IntoIterator<Item = (S, FeatureValue)>>(iter: I) -> Self {
        let mut input = RawInput::new();
        for (k, v) in iter {
            input.insert(k, v);
        }
        input
    }
}
