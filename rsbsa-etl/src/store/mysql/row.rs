//! Conversion between MySQL rows and `Record`s
//!
//! Rows are decoded column by column from the reported type name, so every
//! table can be read with `SELECT *` without a compile-time row type.

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::debug;
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::{Arguments, Column, Row, TypeInfo};

use crate::sync::types::{Record, Value};

/// Decode every column of a row
pub fn decode_row(row: &MySqlRow) -> Result<Record> {
    let mut record = Record::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let type_name = column.type_info().name();
        let value = decode_column(row, idx, type_name)
            .with_context(|| format!("Failed to decode column '{}' ({})", column.name(), type_name))?;
        record.insert(column.name(), value);
    }
    Ok(record)
}

fn decode_column(row: &MySqlRow, idx: usize, type_name: &str) -> Result<Value> {
    let value = match type_name {
        // TINYINT(1) is reported as BOOLEAN; flags like `is_deceased` hold 0/1/2
        "BOOLEAN" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => row
            .try_get_unchecked::<Option<i64>, _>(idx)?
            .map(Value::Int),
        name if name.ends_with("UNSIGNED") => row
            .try_get_unchecked::<Option<u64>, _>(idx)?
            .map(Value::UInt),
        "FLOAT" => row
            .try_get_unchecked::<Option<f32>, _>(idx)?
            .map(|f| Value::Float(f as f64)),
        "DOUBLE" => row
            .try_get_unchecked::<Option<f64>, _>(idx)?
            .map(Value::Float),
        "DECIMAL" => row
            .try_get_unchecked::<Option<String>, _>(idx)?
            .map(Value::Decimal),
        "DATE" => temporal::<NaiveDate>(row, idx)?.map(Value::Date),
        "DATETIME" | "TIMESTAMP" => temporal::<NaiveDateTime>(row, idx)?.map(Value::DateTime),
        "TIME" => temporal::<NaiveTime>(row, idx)?.map(Value::Time),
        "CHAR" | "VARCHAR" | "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET"
        | "JSON" => row
            .try_get_unchecked::<Option<String>, _>(idx)?
            .map(Value::String),
        "NULL" => None,
        // BINARY, VARBINARY, BLOBs, BIT and GEOMETRY travel as raw bytes
        _ => row
            .try_get_unchecked::<Option<Vec<u8>>, _>(idx)?
            .map(Value::Bytes),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Temporal columns in legacy rows may hold zero dates, which have no chrono
/// representation; those read as NULL.
fn temporal<'r, T>(row: &'r MySqlRow, idx: usize) -> Result<Option<T>>
where
    T: sqlx::Decode<'r, sqlx::MySql>,
{
    match row.try_get_unchecked::<Option<T>, _>(idx) {
        Ok(value) => Ok(value),
        Err(sqlx::Error::ColumnDecode { source, .. }) => {
            debug!("Reading undecodable temporal value at column {} as NULL: {}", idx, source);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Bind one value as the next statement parameter
pub fn bind_value(args: &mut MySqlArguments, value: &Value) -> Result<()> {
    let result = match value {
        Value::Null => args.add(None::<String>),
        Value::String(s) => args.add(s.clone()),
        Value::Int(i) => args.add(*i),
        Value::UInt(u) => args.add(*u),
        Value::Float(f) => args.add(*f),
        Value::Decimal(d) => args.add(d.clone()),
        Value::Date(d) => args.add(*d),
        Value::DateTime(dt) => args.add(*dt),
        Value::Time(t) => args.add(*t),
        Value::Bytes(b) => args.add(b.clone()),
    };
    result.map_err(|e| anyhow!("Failed to bind {:?}: {}", value, e))
}

/// Bind a list of key strings
pub fn bind_keys(keys: &[String]) -> Result<MySqlArguments> {
    let mut args = MySqlArguments::default();
    for key in keys {
        args.add(key.clone())
            .map_err(|e| anyhow!("Failed to bind key '{}': {}", key, e))?;
    }
    Ok(args)
}
