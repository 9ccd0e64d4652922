//! Field normalization applied to source rows before transfer

use super::registry::{registry, TableSpec};
use super::types::{Record, Value};

/// Normalize a row for the named table
///
/// Unknown tables pass through unchanged.
pub fn transform(table: &str, record: &Record) -> Record {
    match registry().get(table) {
        Some(spec) => transform_with(spec, record),
        None => record.clone(),
    }
}

/// Normalize a row according to a table spec
///
/// Copies the row and uppercases the spec's designated text fields. Fields
/// that are absent, null or not strings are left untouched, so applying this
/// twice gives the same result as applying it once.
pub fn transform_with(spec: &TableSpec, record: &Record) -> Record {
    let mut out = record.clone();
    for field in spec.uppercase_fields {
        if let Some(Value::String(s)) = out.fields.get_mut(*field) {
            if !s.is_empty() {
                *s = s.to_uppercase();
            }
        }
    }
    out
}
