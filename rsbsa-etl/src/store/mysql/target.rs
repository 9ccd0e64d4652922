use std::collections::{BTreeSet, HashMap};

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use sqlx::mysql::{MySqlArguments, MySqlConnection, MySqlPool};

use super::row::{bind_keys, bind_value, decode_row};
use crate::store::{sql, TargetStore, WritePlan};
use crate::sync::registry::TableSpec;
use crate::sync::types::{Record, Value};

/// Write access to the aggregation hub
///
/// Every plan runs in its own transaction, so a failed table group leaves the
/// target exactly as it was.
pub struct MySqlTarget {
    pool: MySqlPool,
}

impl MySqlTarget {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TargetStore for MySqlTarget {
    async fn ensure_table(&self, spec: &TableSpec) -> Result<()> {
        if !spec.has_schema() {
            return Ok(());
        }
        sqlx::query(&sql::create_table(spec))
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to create table {}", spec.name()))?;
        debug!("Ensured table {}", spec.name());
        Ok(())
    }

    async fn write(&self, spec: &TableSpec, plan: &WritePlan) -> Result<()> {
        if plan.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.context("Failed to start transaction")?;

        let result = match plan {
            WritePlan::Upsert { rows } => upsert_rows(&mut tx, spec, rows).await,
            WritePlan::Replace { keys, rows } => replace_rows(&mut tx, spec, keys, rows).await,
        };

        match result {
            Ok(()) => {
                tx.commit()
                    .await
                    .with_context(|| format!("Failed to commit writes to {}", spec.name()))?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!("Rollback of {} failed: {}", spec.name(), rollback);
                }
                Err(e)
            }
        }
    }
}

async fn upsert_rows(conn: &mut MySqlConnection, spec: &TableSpec, rows: &[Record]) -> Result<()> {
    let key_column = spec.key_column;
    let id_column = spec
        .primary_key
        .with_context(|| format!("{} has no primary key to upsert on", spec.name()))?;

    let keys: Vec<String> = rows.iter().filter_map(|r| r.key(key_column)).collect();
    let ids = target_ids(conn, spec.name(), id_column, key_column, &keys).await?;
    let (updates, inserts) = split_by_target_id(rows, id_column, key_column, &ids);

    debug!(
        "{}: {} updated, {} inserted",
        spec.name(),
        updates.len(),
        inserts.len()
    );

    update_rows(conn, spec, &updates).await?;
    insert_rows(conn, spec.name(), &inserts).await
}

async fn replace_rows(
    conn: &mut MySqlConnection,
    spec: &TableSpec,
    keys: &[String],
    rows: &[Record],
) -> Result<()> {
    let mut deleted = 0u64;
    for chunk in keys.chunks(sql::MAX_BIND_PARAMS) {
        let statement = sql::delete_in(spec.name(), spec.key_column, chunk.len());
        let result = sqlx::query_with(&statement, bind_keys(chunk)?)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to delete existing rows from {}", spec.name()))?;
        deleted += result.rows_affected();
    }

    debug!(
        "{}: replaced {} rows with {} for {} keys",
        spec.name(),
        deleted,
        rows.len(),
        keys.len()
    );

    let rows: Vec<&Record> = rows.iter().collect();
    insert_rows(conn, spec.name(), &rows).await
}

/// Target id of the first row holding each key
async fn target_ids(
    conn: &mut MySqlConnection,
    table: &str,
    id_column: &str,
    key_column: &str,
    keys: &[String],
) -> Result<HashMap<String, Value>> {
    let mut ids = HashMap::new();
    for chunk in keys.chunks(sql::MAX_BIND_PARAMS) {
        let statement = sql::select_key_ids(table, id_column, key_column, chunk.len());
        let rows = sqlx::query_with(&statement, bind_keys(chunk)?)
            .fetch_all(&mut *conn)
            .await
            .with_context(|| format!("Failed to read existing keys from {}", table))?;
        for row in &rows {
            let record = decode_row(row)?;
            if let (Some(key), Some(id)) = (record.key(key_column), record.get(id_column)) {
                ids.entry(key).or_insert_with(|| id.clone());
            }
        }
    }
    Ok(ids)
}

/// Split rows into updates, carrying the target's id, and plain inserts
///
/// The source's own id is replaced so an update never moves the target row.
fn split_by_target_id<'a>(
    rows: &'a [Record],
    id_column: &str,
    key_column: &str,
    ids: &HashMap<String, Value>,
) -> (Vec<Record>, Vec<&'a Record>) {
    let mut updates = Vec::new();
    let mut inserts = Vec::new();
    for row in rows {
        match row.key(key_column).and_then(|key| ids.get(&key)) {
            Some(id) => {
                let mut row = row.clone();
                row.insert(id_column, id.clone());
                updates.push(row);
            }
            None => inserts.push(row),
        }
    }
    (updates, inserts)
}

/// Bulk upsert onto existing ids, overwriting everything but the key and the id
async fn update_rows(conn: &mut MySqlConnection, spec: &TableSpec, rows: &[Record]) -> Result<()> {
    let rows: Vec<&Record> = rows.iter().collect();
    let columns = union_columns(&rows);
    let updates: Vec<&str> = columns
        .iter()
        .copied()
        .filter(|c| spec.is_updatable(c))
        .collect();
    if rows.is_empty() || updates.is_empty() {
        return Ok(());
    }

    for chunk in rows.chunks(sql::rows_per_statement(columns.len())) {
        let statement = sql::insert_on_duplicate(spec.name(), &columns, chunk.len(), &updates);
        sqlx::query_with(&statement, bind_rows(chunk, &columns)?)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to update {} rows in {}", chunk.len(), spec.name()))?;
    }

    Ok(())
}

/// Bulk insert, split so no statement exceeds the placeholder limit
async fn insert_rows(conn: &mut MySqlConnection, table: &str, rows: &[&Record]) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let columns = union_columns(rows);
    for chunk in rows.chunks(sql::rows_per_statement(columns.len())) {
        let statement = sql::insert(table, &columns, chunk.len());
        sqlx::query_with(&statement, bind_rows(chunk, &columns)?)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to insert {} rows into {}", chunk.len(), table))?;
    }

    Ok(())
}

/// Rows of one source table share columns, but a missing one binds NULL
fn union_columns<'a>(rows: &[&'a Record]) -> Vec<&'a str> {
    rows.iter()
        .flat_map(|r| r.columns())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn bind_rows(rows: &[&Record], columns: &[&str]) -> Result<MySqlArguments> {
    let mut args = MySqlArguments::default();
    for row in rows {
        for column in columns {
            bind_value(&mut args, row.get(column).unwrap_or(&Value::Null))?;
        }
    }
    Ok(args)
}
