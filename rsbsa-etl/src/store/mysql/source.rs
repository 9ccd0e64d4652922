use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use sqlx::mysql::MySqlPool;

use super::row::{bind_keys, decode_row};
use crate::store::sql;
use crate::store::SourceStore;
use crate::sync::types::Record;

/// Read-only access to the source registry
pub struct MySqlSource {
    pool: MySqlPool,
    /// Keys per `IN (...)` list
    chunk_size: usize,
}

impl MySqlSource {
    pub fn new(pool: MySqlPool, chunk_size: usize) -> Self {
        Self {
            pool,
            chunk_size: chunk_size.clamp(1, sql::MAX_BIND_PARAMS),
        }
    }
}

#[async_trait]
impl SourceStore for MySqlSource {
    async fn select_in(&self, table: &str, column: &str, values: &[String]) -> Result<Vec<Record>> {
        let mut records = Vec::new();

        for chunk in values.chunks(self.chunk_size) {
            let statement = sql::select_in(table, column, chunk.len());
            let rows = sqlx::query_with(&statement, bind_keys(chunk)?)
                .fetch_all(&self.pool)
                .await
                .with_context(|| format!("Failed to read {} by {}", table, column))?;

            debug!("Read {} rows from {} for {} keys", rows.len(), table, chunk.len());

            for row in &rows {
                records.push(decode_row(row).with_context(|| format!("Bad row in {}", table))?);
            }
        }

        Ok(records)
    }
}
