//! Storage seams used by the sync engine
//!
//! The engine talks to three stores: the change log, the source registry and
//! the aggregation hub. Each is a trait so the engine can run against MySQL in
//! production and against an in-memory store in tests.

pub mod mysql;
pub mod sql;

#[cfg(test)]
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::sync::registry::TableSpec;
use crate::sync::types::{ChangeLogEntry, Record};

/// Read access to the change log
#[async_trait]
pub trait ChangeLogStore: Send + Sync {
    /// Number of entries with both an entity key and a table name
    async fn count_pending(&self) -> Result<u64>;

    /// One page of entries in ascending `log_id` order
    ///
    /// Malformed entries are included so the caller can account for them.
    async fn fetch_page(&self, offset: u64, limit: u64) -> Result<Vec<ChangeLogEntry>>;
}

/// Read access to the source registry
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// All rows of `table` whose `column` is one of `values`
    ///
    /// An empty `values` slice returns no rows without querying.
    async fn select_in(&self, table: &str, column: &str, values: &[String]) -> Result<Vec<Record>>;
}

/// Write access to the aggregation hub
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Create the table if it does not exist
    async fn ensure_table(&self, spec: &TableSpec) -> Result<()>;

    /// Apply a write plan atomically: either all of it commits or none of it does
    async fn write(&self, spec: &TableSpec, plan: &WritePlan) -> Result<()>;
}

/// Writes for one table group, computed by the upsert engine
#[derive(Debug, Clone, PartialEq)]
pub enum WritePlan {
    /// One row per key: rows whose key exists are updated in place, the rest
    /// are inserted
    Upsert { rows: Vec<Record> },
    /// Every target row for `keys` is deleted, then `rows` are inserted
    Replace { keys: Vec<String>, rows: Vec<Record> },
}

impl WritePlan {
    pub fn rows(&self) -> &[Record] {
        match self {
            WritePlan::Upsert { rows } | WritePlan::Replace { rows, .. } => rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            WritePlan::Upsert { rows } => rows.is_empty(),
            WritePlan::Replace { keys, rows } => keys.is_empty() && rows.is_empty(),
        }
    }
}
