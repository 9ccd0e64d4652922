//! In-memory stores for unit tests
//!
//! Semantics follow the MySQL stores: writes are all-or-nothing, tables without
//! a registered schema must be created up front, and every source query is
//! recorded so tests can assert what the engine asked for.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ChangeLogStore, SourceStore, TargetStore, WritePlan};
use crate::sync::registry::TableSpec;
use crate::sync::resolve::collation_key;
use crate::sync::types::{ChangeLogEntry, Record};

/// A recorded `select_in` call
#[derive(Debug, Clone, PartialEq)]
pub struct SourceQuery {
    pub table: String,
    pub column: String,
    pub values: Vec<String>,
}

#[derive(Default)]
struct State {
    change_log: Vec<ChangeLogEntry>,
    source: HashMap<String, Vec<Record>>,
    target: HashMap<String, Vec<Record>>,
    source_queries: Vec<SourceQuery>,
    ensured: Vec<String>,
    failing_writes: HashSet<String>,
    failing_reads: HashSet<String>,
    change_log_down: bool,
}

/// Change log, source and target in one process-local store
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_entry(&self, entry: ChangeLogEntry) {
        self.state.lock().await.change_log.push(entry);
    }

    pub async fn add_source_rows(&self, table: &str, rows: Vec<Record>) {
        self.state
            .lock()
            .await
            .source
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Replace the source snapshot of a table
    pub async fn set_source_rows(&self, table: &str, rows: Vec<Record>) {
        self.state.lock().await.source.insert(table.to_string(), rows);
    }

    /// Create an empty target table (needed for tables without a schema)
    pub async fn create_target_table(&self, table: &str) {
        self.state.lock().await.target.entry(table.to_string()).or_default();
    }

    pub async fn target_rows(&self, table: &str) -> Vec<Record> {
        self.state
            .lock()
            .await
            .target
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn source_queries(&self) -> Vec<SourceQuery> {
        self.state.lock().await.source_queries.clone()
    }

    pub async fn ensured_tables(&self) -> Vec<String> {
        self.state.lock().await.ensured.clone()
    }

    /// Make every write to `table` fail
    pub async fn fail_writes_to(&self, table: &str) {
        self.state.lock().await.failing_writes.insert(table.to_string());
    }

    /// Make every source read of `table` fail
    pub async fn fail_reads_from(&self, table: &str) {
        self.state.lock().await.failing_reads.insert(table.to_string());
    }

    /// Simulate losing the change-log connection
    pub async fn take_change_log_down(&self) {
        self.state.lock().await.change_log_down = true;
    }
}

#[async_trait]
impl ChangeLogStore for MemoryStore {
    async fn count_pending(&self) -> Result<u64> {
        let state = self.state.lock().await;
        if state.change_log_down {
            bail!("change log unreachable");
        }
        Ok(state.change_log.iter().filter(|e| e.is_complete()).count() as u64)
    }

    async fn fetch_page(&self, offset: u64, limit: u64) -> Result<Vec<ChangeLogEntry>> {
        let state = self.state.lock().await;
        if state.change_log_down {
            bail!("change log unreachable");
        }
        let mut entries = state.change_log.clone();
        entries.sort_by_key(|e| e.log_id);
        Ok(entries
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}

#[async_trait]
impl SourceStore for MemoryStore {
    async fn select_in(&self, table: &str, column: &str, values: &[String]) -> Result<Vec<Record>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let mut state = self.state.lock().await;
        state.source_queries.push(SourceQuery {
            table: table.to_string(),
            column: column.to_string(),
            values: values.to_vec(),
        });
        if state.failing_reads.contains(table) {
            bail!("source read from {} failed", table);
        }
        // Match the way MySQL's default collation does
        let wanted: HashSet<String> = values.iter().map(|v| collation_key(v)).collect();
        Ok(state
            .source
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.key(column).is_some_and(|k| wanted.contains(&collation_key(&k))))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn ensure_table(&self, spec: &TableSpec) -> Result<()> {
        if !spec.has_schema() {
            return Ok(());
        }
        let mut state = self.state.lock().await;
        state.target.entry(spec.name().to_string()).or_default();
        state.ensured.push(spec.name().to_string());
        Ok(())
    }

    async fn write(&self, spec: &TableSpec, plan: &WritePlan) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.failing_writes.contains(spec.name()) {
            bail!("write to {} failed", spec.name());
        }
        let Some(current) = state.target.get(spec.name()) else {
            bail!("Table '{}' doesn't exist", spec.name());
        };

        // Work on a copy so a failed plan leaves the table untouched
        let mut table = current.clone();
        let key_column = spec.key_column;

        match plan {
            WritePlan::Upsert { rows } => {
                for row in rows {
                    let key = row.key(key_column);
                    let existing = table
                        .iter_mut()
                        .find(|t| key.is_some() && t.key(key_column) == key);
                    match existing {
                        Some(target) => {
                            for (column, value) in &row.fields {
                                if spec.is_updatable(column) {
                                    target.insert(column.clone(), value.clone());
                                }
                            }
                        }
                        None => table.push(row.clone()),
                    }
                }
            }
            WritePlan::Replace { keys, rows } => {
                let doomed: HashSet<&str> = keys.iter().map(String::as_str).collect();
                table.retain(|t| !t.key(key_column).is_some_and(|k| doomed.contains(k.as_str())));
                table.extend(rows.iter().cloned());
            }
        }

        state.target.insert(spec.name().to_string(), table);
        Ok(())
    }
}
