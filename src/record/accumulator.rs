//! In-progress record of one collection event.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::field::Field;

/// Value stored in one field of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Measured value, already rounded to storage precision.
    Number(f64),
    /// Raw operator text.
    Text(String),
}

impl fmt::Display for FieldValue {
    /// Numbers always carry two decimals, text is written verbatim.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(value) => write!(f, "{value:.2}"),
            FieldValue::Text(text) => f.write_str(text),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// One row of output data.
///
/// Every field is always present; an unacquired field is `None`, never absent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    values: [Option<FieldValue>; Field::COUNT],
}

impl Record {
    /// Record with every field unset.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Value of `field`, `None` when unset.
    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.values[field.index()].as_ref()
    }

    /// Returns a copy with `field` set, leaving `self` untouched.
    pub fn with(mut self, field: Field, value: impl Into<FieldValue>) -> Self {
        self.values[field.index()] = Some(value.into());
        self
    }

    /// Whether `field` holds a value.
    pub fn is_set(&self, field: Field) -> bool {
        self.values[field.index()].is_some()
    }

    /// Fields still unset, in column order.
    pub fn missing(&self) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|field| !self.is_set(*field))
            .collect()
    }

    /// No field is set.
    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// Iterates every field in column order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, Option<&FieldValue>)> + '_ {
        Field::ALL.into_iter().map(move |field| (field, self.get(field)))
    }

    /// Cells of the persisted row; unset fields serialize as empty strings.
    pub fn to_row(&self) -> Vec<String> {
        self.iter()
            .map(|(_, value)| value.map(ToString::to_string).unwrap_or_default())
            .collect()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Field::COUNT))?;
        for (field, value) in self.iter() {
            map.serialize_entry(field.header(), &value)?;
        }
        map.end()
    }
}

/// Holds the single active record across acquisition events.
///
/// Only the acquisition orchestrator owns one of these; every mutation goes through it.
#[derive(Debug, Default)]
pub struct RecordAccumulator {
    current: Record,
}

impl RecordAccumulator {
    /// Accumulator holding an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the value of `field`. No type validation happens at this layer.
    pub fn set(&mut self, field: Field, value: impl Into<FieldValue>) {
        self.current.values[field.index()] = Some(value.into());
    }

    /// Current value of `field`.
    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.current.get(field)
    }

    /// Immutable copy of the current record, unset fields included.
    pub fn snapshot(&self) -> Record {
        self.current.clone()
    }

    /// Unsets every field.
    pub fn reset(&mut self) {
        self.current = Record::empty();
    }
}
