//! Target writes for one table group
//!
//! One-to-one tables are updated in place by key; one-to-many tables have every
//! row for the touched keys replaced. The store applies each plan in a single
//! transaction.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::Mutex;

use super::registry::TableSpec;
use super::resolve::distinct;
use super::types::{Record, SkipNotice, SkipReason};
use crate::store::{TargetStore, WritePlan};

/// A table group's write failed and was rolled back
#[derive(Debug)]
pub struct TransferError {
    pub table: String,
    /// Every entity key the failed group covered
    pub entity_keys: Vec<String>,
    pub cause: anyhow::Error,
}

impl TransferError {
    pub fn new(table: impl Into<String>, entity_keys: Vec<String>, cause: anyhow::Error) -> Self {
        Self {
            table: table.into(),
            entity_keys,
            cause,
        }
    }
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} keys): {:#}",
            self.table,
            self.entity_keys.len(),
            self.cause
        )
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.cause)
    }
}

/// A write plan with the rows that could not be part of it
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub plan: WritePlan,
    pub skipped: Vec<SkipNotice>,
}

/// Result of a successful upsert
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertOutcome {
    /// Rows inserted or updated
    pub written: usize,
    pub skipped: Vec<SkipNotice>,
}

/// Creates target tables and applies grouped writes
pub struct UpsertEngine {
    target: Arc<dyn TargetStore>,
    ensured: Mutex<HashSet<String>>,
}

impl UpsertEngine {
    pub fn new(target: Arc<dyn TargetStore>) -> Self {
        Self {
            target,
            ensured: Mutex::new(HashSet::new()),
        }
    }

    /// Create the table if needed; issued once per table per engine
    pub async fn ensure_schema(&self, spec: &TableSpec) -> anyhow::Result<()> {
        let mut ensured = self.ensured.lock().await;
        if ensured.contains(spec.name()) {
            return Ok(());
        }
        self.target.ensure_table(spec).await?;
        ensured.insert(spec.name().to_string());
        Ok(())
    }

    /// Write transformed rows for one table group
    ///
    /// `entity_keys` are the group's keys, reported on failure.
    pub async fn upsert(
        &self,
        spec: &TableSpec,
        rows: Vec<Record>,
        entity_keys: &[String],
    ) -> Result<UpsertOutcome, TransferError> {
        let fail = |cause: anyhow::Error| TransferError::new(spec.name(), entity_keys.to_vec(), cause);

        self.ensure_schema(spec).await.map_err(fail)?;

        let Prepared { plan, skipped } = prepare(spec, rows);
        if plan.is_empty() {
            return Ok(UpsertOutcome { written: 0, skipped });
        }

        self.target.write(spec, &plan).await.map_err(fail)?;

        let written = plan.rows().len();
        debug!("{}: wrote {} rows", spec.name(), written);
        Ok(UpsertOutcome { written, skipped })
    }
}

/// Build the write plan for a batch of rows
///
/// Rows are projected onto the registered columns, rows without a key value
/// are dropped, and one-to-one rows are reduced to the last row per key.
pub fn prepare(spec: &TableSpec, rows: Vec<Record>) -> Prepared {
    let key_column = spec.key_column;
    let mut skipped = Vec::new();
    let mut dropped_columns = BTreeSet::new();
    let mut keyed: Vec<(String, Record)> = Vec::with_capacity(rows.len());

    for mut row in rows {
        if spec.has_schema() {
            row.fields.retain(|column, _| {
                let keep = spec.has_column(column);
                if !keep {
                    dropped_columns.insert(column.clone());
                }
                keep
            });
        }
        match row.key(key_column) {
            Some(key) => keyed.push((key, row)),
            None => skipped.push(SkipNotice {
                log_id: None,
                table: Some(spec.name().to_string()),
                entity_key: row.entity_key(),
                reason: SkipReason::MissingKeyColumn,
            }),
        }
    }

    if !dropped_columns.is_empty() {
        debug!(
            "{}: ignoring source columns not in target schema: {}",
            spec.name(),
            dropped_columns.into_iter().collect::<Vec<_>>().join(", ")
        );
    }

    let plan = if spec.is_one_to_one() {
        WritePlan::Upsert {
            rows: last_per_key(spec, keyed),
        }
    } else {
        WritePlan::Replace {
            keys: distinct(keyed.iter().map(|(key, _)| key.clone())),
            rows: keyed.into_iter().map(|(_, row)| row).collect(),
        }
    };

    Prepared { plan, skipped }
}

/// Keep the last row for each key, at the position the key was first seen
fn last_per_key(spec: &TableSpec, keyed: Vec<(String, Record)>) -> Vec<Record> {
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut rows: Vec<Record> = Vec::with_capacity(keyed.len());

    for (key, row) in keyed {
        match position.get(&key) {
            Some(&idx) => {
                warn!(
                    "{}: duplicate source rows for {} {}, keeping the last",
                    spec.name(),
                    spec.key_column,
                    key
                );
                rows[idx] = row;
            }
            None => {
                position.insert(key, rows.len());
                rows.push(row);
            }
        }
    }

    rows
}
