//! Source rows as ordered column maps

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Value;

/// Natural identifier correlating one farmer across all registry tables
pub const ENTITY_KEY_COLUMN: &str = "rsbsa_no";

/// One row read from the source store
///
/// Columns are kept in a sorted map so every row of a batch yields the same
/// column order when bulk statements are generated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from a JSON object (test fixtures, reports)
    pub fn from_json(json: &serde_json::Value) -> Self {
        let fields = json
            .as_object()
            .map(|obj| {
                obj.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect()
            })
            .unwrap_or_default();
        Self { fields }
    }

    /// Builder-style setter
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(column.into(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.fields.insert(column.into(), value);
    }

    /// Key string for `column`, if present and non-null
    pub fn key(&self, column: &str) -> Option<String> {
        self.fields.get(column).and_then(Value::as_key)
    }

    /// The farmer's `rsbsa_no`, if present
    pub fn entity_key(&self) -> Option<String> {
        self.key(ENTITY_KEY_COLUMN)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let obj: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        serde_json::Value::Object(obj)
    }
}
