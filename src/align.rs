//! Row alignment: reshape an arbitrary input mapping into the model's columns.
//!
//! With a schema, the produced row has exactly the schema's columns in
//! schema order whatever the input contained:
//!
//! - supplied values are taken as coerced,
//! - absent (or blank) values get the slot's default,
//! - keys the schema does not name are dropped.
//!
//! Without a schema, every input key passes through in arrival order.
//!
//! Alignment never fails for missing or extra keys. It fails only for an
//! empty input, or for a value that cannot occupy its slot (see
//! [`AlignError::Coercion`]).

use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::input::RawInput;
use crate::schema::{FeatureKind, FeatureSchema};
use crate::value::FeatureValue;

/// Alignment failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AlignError {
    #[error("no features supplied")]
    Empty,

    /// A value kept in the row has no usable representation for its slot.
    #[error("invalid {expected} field '{field}': {value}")]
    Coercion {
        field: String,
        value: String,
        expected: &'static str,
    },
}

// =============================================================================
// AlignedRow
// =============================================================================

/// One model input row: ordered `(name, value)` pairs.
///
/// Built once per request and never modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    columns: Vec<(String, FeatureValue)>,
}

impl AlignedRow {
    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names in row order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(k, _)| k.as_str())
    }

    /// `(name, value)` pairs in row order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Value by column name.
    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.columns.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }
}

impl Serialize for AlignedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (k, v) in &self.columns {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

// =============================================================================
// Aligner
// =============================================================================

/// Builds [`AlignedRow`]s against an optional schema.
#[derive(Debug, Clone, Default)]
pub struct Aligner {
    schema: Option<Arc<FeatureSchema>>,
}

impl Aligner {
    pub fn new(schema: Option<Arc<FeatureSchema>>) -> Self {
        Self { schema }
    }

    /// Aligner with no schema: every key passes through.
    pub fn pass_through() -> Self {
        Self { schema: None }
    }

    #[inline]
    pub fn schema(&self) -> Option<&FeatureSchema> {
        self.schema.as_deref()
    }

    /// Build the row for `input`.
    pub fn align(&self, input: &RawInput) -> Result<AlignedRow, AlignError> {
        if input.is_empty() {
            return Err(AlignError::Empty);
        }
        let columns = match &self.schema {
            Some(schema) => Self::align_to_schema(schema, input)?,
            None => Self::pass_through_columns(input)?,
        };
        Ok(AlignedRow { columns })
    }

    fn align_to_schema(
        schema: &FeatureSchema,
        input: &RawInput,
    ) -> Result<Vec<(String, FeatureValue)>, AlignError> {
        let mut columns = Vec::with_capacity(schema.len());
        for slot in schema.slots() {
            let value = match input.supplied(&slot.name) {
                Some(value) => {
                    check_slot(&slot.name, value, slot.declared_kind)?;
                    value.clone()
                }
                None => slot.kind().default_value(),
            };
            columns.push((slot.name.clone(), value));
        }
        Ok(columns)
    }

    fn pass_through_columns(input: &RawInput) -> Result<Vec<(String, FeatureValue)>, AlignError> {
        input
            .iter()
            .map(|(name, value)| {
                check_slot(name, value, None)?;
                Ok((name.to_string(), value.clone()))
            })
            .collect()
    }
}

/// Reject values that cannot occupy a slot of the given declared kind.
fn check_slot(
    field: &str,
    value: &FeatureValue,
    declared: Option<FeatureKind>,
) -> Result<(), AlignError> {
    match (value, declared) {
        (FeatureValue::Invalid(raw), kind) => Err(AlignError::Coercion {
            field: field.to_string(),
            value: raw.to_string(),
            expected: match kind {
                Some(FeatureKind::Categorical) => "categorical",
                _ => "numeric",
            },
        }),
        (FeatureValue::Categorical(text), Some(FeatureKind::Numeric)) => {
            Err(AlignError::Coercion {
                field: field.to_string(),
                value: format!("{text:?}"),
                expected: "numeric",
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(payload: serde_json::Value) -> RawInput {
        RawInput::from_payload(&payload).unwrap()
    }

    fn car_schema() -> Arc<FeatureSchema> {
        Arc::new(
            FeatureSchema::typed([
                ("Year", FeatureKind::Numeric),
                ("Mileage", FeatureKind::Numeric),
                ("Brand", FeatureKind::Categorical),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn schema_order_and_columns_are_exact() {
        let aligner = Aligner::new(Some(car_schema()));
        let row = aligner
            .align(&raw(json!({"Brand": "Ford", "Color": "red", "Year": 2015})))
            .unwrap();

        assert_eq!(row.names().collect::<Vec<_>>(), vec!["Year", "Mileage", "Brand"]);
        assert_eq!(row.get("Year"), Some(&FeatureValue::int(2015)));
        assert_eq!(row.get("Mileage"), Some(&FeatureValue::int(0)));
        assert_eq!(row.get("Brand"), Some(&FeatureValue::categorical("Ford")));
        assert_eq!(row.get("Color"), None);
    }

    #[test]
    fn permutation_of_input_keys_gives_same_row() {
        let aligner = Aligner::new(Some(car_schema()));
        let a = aligner
            .align(&raw(json!({"Year": 2015, "Mileage": 10, "Brand": "BMW"})))
            .unwrap();
        let b = aligner
            .align(&raw(json!({"Brand": "BMW", "Mileage": 10, "Year": 2015})))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_categorical_stays_missing() {
        let aligner = Aligner::new(Some(car_schema()));
        let row = aligner.align(&raw(json!({"Year": 2015, "Brand": ""}))).unwrap();
        assert_eq!(row.get("Brand"), Some(&FeatureValue::Missing));
    }

    #[test]
    fn unknown_only_input_gives_all_defaults() {
        let aligner = Aligner::new(Some(car_schema()));
        let row = aligner.align(&raw(json!({"foo": "bar"}))).unwrap();
        assert_eq!(row.len(), 3);
        assert_eq!(row.get("Year"), Some(&FeatureValue::int(0)));
        assert_eq!(row.get("Mileage"), Some(&FeatureValue::int(0)));
        assert_eq!(row.get("Brand"), Some(&FeatureValue::Missing));
    }

    #[test]
    fn text_in_numeric_slot_is_a_coercion_error() {
        let aligner = Aligner::new(Some(car_schema()));
        let err = aligner
            .align(&raw(json!({"Year": "twenty", "Brand": "BMW"})))
            .unwrap_err();
        assert_eq!(
            err,
            AlignError::Coercion {
                field: "Year".into(),
                value: "\"twenty\"".into(),
                expected: "numeric",
            }
        );
    }

    #[test]
    fn dropped_fields_are_not_checked() {
        let aligner = Aligner::new(Some(car_schema()));
        assert!(aligner
            .align(&raw(json!({"Year": 2015, "Extras": [1, 2]})))
            .is_ok());
    }

    #[test]
    fn undeclared_slots_accept_text() {
        let schema = Arc::new(FeatureSchema::from_names(["Year", "Brand"]).unwrap());
        let row = Aligner::new(Some(schema))
            .align(&raw(json!({"Brand": "Kia"})))
            .unwrap();
        assert_eq!(row.get("Brand"), Some(&FeatureValue::categorical("Kia")));
        // Undeclared slots default like numeric ones.
        assert_eq!(row.get("Year"), Some(&FeatureValue::int(0)));
    }

    #[test]
    fn pass_through_keeps_arrival_order() {
        let aligner = Aligner::pass_through();
        let input = raw(json!({"b": "2", "a": "x", "c": null}));
        let first = aligner.align(&input).unwrap();
        let second = aligner.align(&input).unwrap();

        assert_eq!(first.names().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert_eq!(first.get("b"), Some(&FeatureValue::int(2)));
        assert_eq!(first.get("c"), Some(&FeatureValue::Missing));
        assert_eq!(first, second);
    }

    #[test]
    fn pass_through_rejects_invalid_values() {
        let err = Aligner::pass_through()
            .align(&raw(json!({"a": {"nested": true}})))
            .unwrap_err();
        assert!(matches!(err, AlignError::Coercion { ref field, .. } if field == "a"));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(
            Aligner::pass_through().align(&RawInput::new()),
            Err(AlignError::Empty)
        );
    }

    #[test]
    fn row_serializes_as_ordered_object() {
        let row = Aligner::new(Some(car_schema()))
            .align(&raw(json!({"Brand": "BMW", "Year": 2020})))
            .unwrap();
        assert_eq!(
            serde_json::to_string(&row).unwrap(),
            r#"{"Year":2020,"Mileage":0,"Brand":"BMW"}"#
        );
    }
}
