//! Change-log entries

use serde::{Deserialize, Serialize};

/// One row of the change log (`etl_logger_profiling`)
///
/// Written by an external process; the engine only reads it. The key and
/// table are optional because the log itself does not enforce them and the
/// orchestrator has to count malformed entries as skips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub log_id: i64,
    pub entity_key: Option<String>,
    pub table_name: Option<String>,
}

impl ChangeLogEntry {
    pub fn new(log_id: i64, entity_key: Option<&str>, table_name: Option<&str>) -> Self {
        Self {
            log_id,
            entity_key: entity_key.map(str::to_string),
            table_name: table_name.map(str::to_string),
        }
    }

    /// Both fields present and non-blank
    pub fn is_complete(&self) -> bool {
        non_blank(&self.entity_key) && non_blank(&self.table_name)
    }
}

fn non_blank(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}
