//! Run and page bookkeeping

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why an entry or key was not transferred
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Change-log entry without a table name or entity key
    MissingField,
    /// Table is not in the registry and the policy is to skip
    UnknownTable,
    /// Nothing in the source store for the requested key
    NoSourceData,
    /// Source row without a value in the table's key column
    MissingKeyColumn,
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::MissingField => "missing table or RSBSA number",
            SkipReason::UnknownTable => "table not registered",
            SkipReason::NoSourceData => "no source data",
            SkipReason::MissingKeyColumn => "row has no key value",
        }
    }
}

/// A skipped entry or key, kept for the page's warning sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipNotice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_key: Option<String>,
    pub reason: SkipReason,
}

impl std::fmt::Display for SkipNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason.label())?;
        if let Some(key) = &self.entity_key {
            write!(f, " for RSBSA {}", key)?;
        }
        if let Some(table) = &self.table {
            write!(f, " in {}", table)?;
        }
        if let Some(log_id) = self.log_id {
            write!(f, " (log_id {})", log_id)?;
        }
        Ok(())
    }
}

/// A failed transfer, one per affected entity key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyError {
    pub table: String,
    pub entity_key: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Outcome of processing one change-log page
#[derive(Debug, Clone, Default)]
pub struct PageReport {
    pub entries: usize,
    pub processed: usize,
    pub skipped: Vec<SkipNotice>,
    pub errors: Vec<KeyError>,
}

impl PageReport {
    pub fn skip(&mut self, notice: SkipNotice) {
        self.skipped.push(notice);
    }

    pub fn merge(&mut self, other: PageReport) {
        self.processed += other.processed;
        self.skipped.extend(other.skipped);
        self.errors.extend(other.errors);
    }

    /// Errors as a percentage of the page's entries
    pub fn error_rate(&self) -> f64 {
        if self.entries == 0 {
            0.0
        } else {
            self.errors.len() as f64 / self.entries as f64 * 100.0
        }
    }
}

/// Result of one engine pass, reported to the control layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    /// Rows written to target tables (cascaded parcels included)
    pub processed: usize,
    pub skipped: usize,
    /// Entity keys whose table group failed and was rolled back
    pub failed: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Bounded sample of key errors across the run
    pub errors: Vec<KeyError>,
}

impl RunSummary {
    pub fn started(run_id: Uuid, start_time: DateTime<Utc>) -> Self {
        Self {
            run_id,
            processed: 0,
            skipped: 0,
            failed: 0,
            start_time,
            end_time: start_time,
            errors: Vec::new(),
        }
    }

    /// Nothing was pending
    pub fn is_idle(&self) -> bool {
        self.processed == 0 && self.skipped == 0 && self.failed == 0
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }
}
