use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::mysql::MySqlPool;
use sqlx::Row;

use crate::store::sql::quote_ident;
use crate::store::ChangeLogStore;
use crate::sync::types::ChangeLogEntry;

/// Change log read from the source database
///
/// Entries are read in pages of ascending `log_id` and never modified.
pub struct MySqlChangeLog {
    pool: MySqlPool,
    table: String,
}

impl MySqlChangeLog {
    /// `table` must be a plain identifier (see `EngineConfig::validate`)
    pub fn new(pool: MySqlPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }
}

#[async_trait]
impl ChangeLogStore for MySqlChangeLog {
    async fn count_pending(&self) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) AS total FROM {} \
             WHERE rsbsa_no IS NOT NULL AND TRIM(rsbsa_no) <> '' \
             AND `table` IS NOT NULL AND TRIM(`table`) <> ''",
            quote_ident(&self.table)
        );
        let row = sqlx::query(&sql)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count pending change log entries")?;
        let total: i64 = row.try_get("total")?;
        Ok(total.max(0) as u64)
    }

    async fn fetch_page(&self, offset: u64, limit: u64) -> Result<Vec<ChangeLogEntry>> {
        let sql = format!(
            "SELECT log_id, rsbsa_no, `table` FROM {} ORDER BY log_id ASC LIMIT ? OFFSET ?",
            quote_ident(&self.table)
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch change log page at offset {}", offset))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            // log_id may be declared signed or unsigned
            let log_id: i64 = row
                .try_get_unchecked("log_id")
                .context("Failed to read log_id")?;
            entries.push(ChangeLogEntry {
                log_id,
                entity_key: row.try_get_unchecked("rsbsa_no")?,
                table_name: row.try_get_unchecked("table")?,
            });
        }

        Ok(entries)
    }
}
