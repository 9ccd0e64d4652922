//! Batch orchestrator
//!
//! Pages through the change log, groups each page by table, and runs every
//! table group through resolve, transform and upsert. Table groups fail in
//! isolation; only change-log failures abort a run.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use futures::future::join_all;
use log::{error, info, warn};
use uuid::Uuid;

use super::concurrency::ConcurrencyLimiter;
use super::group::{assign_lanes, group_entries, Grouping, TableGroup};
use super::registry::registry;
use super::resolve::SourceResolver;
use super::transform::transform_with;
use super::types::{ChangeLogEntry, KeyError, PageReport, Record, RunSummary, SkipNotice, SkipReason};
use super::upsert::{TransferError, UpsertEngine, UpsertOutcome};
use crate::config::EngineConfig;
use crate::store::{ChangeLogStore, SourceStore, TargetStore};

/// Upper bound on key errors carried in a run summary
const RUN_ERROR_SAMPLE: usize = 50;

/// Per-run collaborators; dropped when the run ends
struct RunContext {
    resolver: SourceResolver,
    upserts: UpsertEngine,
    limiter: ConcurrencyLimiter,
}

/// Synchronizes the source registry into the aggregation hub
///
/// Holds no state between runs. Callers must not start a second run while one
/// is in progress.
pub struct SyncEngine {
    change_log: Arc<dyn ChangeLogStore>,
    source: Arc<dyn SourceStore>,
    target: Arc<dyn TargetStore>,
    config: EngineConfig,
}

impl SyncEngine {
    pub fn new(
        change_log: Arc<dyn ChangeLogStore>,
        source: Arc<dyn SourceStore>,
        target: Arc<dyn TargetStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            change_log,
            source,
            target,
            config,
        }
    }

    /// Process every pending change-log entry once
    pub async fn run_once(&self) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let mut summary = RunSummary::started(run_id, Utc::now());

        let total = self
            .change_log
            .count_pending()
            .await
            .context("Failed to count pending change log entries")?;

        if total == 0 {
            info!("Run {}: no pending changes", run_id);
            summary.end_time = Utc::now();
            return Ok(summary);
        }

        info!(
            "Run {}: {} pending change log entries, page size {}",
            run_id, total, self.config.page_size
        );

        let ctx = RunContext {
            resolver: SourceResolver::new(self.source.clone()),
            upserts: UpsertEngine::new(self.target.clone()),
            limiter: ConcurrencyLimiter::new(self.config.max_concurrent_groups),
        };

        let page_size = self.config.page_size.max(1);
        let mut offset = 0u64;
        let mut page = 0usize;
        let mut scanned = 0usize;

        loop {
            let entries = self
                .change_log
                .fetch_page(offset, page_size)
                .await
                .with_context(|| format!("Failed to fetch change log page at offset {}", offset))?;

            if entries.is_empty() {
                break;
            }
            page += 1;

            let report = self.process_page(&ctx, &entries).await?;
            self.log_page(page, &report);

            summary.processed += report.processed;
            summary.skipped += report.skipped.len();
            summary.failed += report.errors.len();
            let room = RUN_ERROR_SAMPLE.saturating_sub(summary.errors.len());
            summary.errors.extend(report.errors.into_iter().take(room));

            offset += page_size;
            scanned += entries.len();
            // Pages also carry malformed entries, which the pending count leaves out
            info!(
                "Progress: page {}, {} entries scanned ({} pending at start): {} processed, {} skipped, {} failed",
                page,
                scanned,
                total,
                summary.processed,
                summary.skipped,
                summary.failed
            );

            if (entries.len() as u64) < page_size {
                break;
            }

            if !self.config.page_pause.is_zero() {
                tokio::time::sleep(self.config.page_pause).await;
            }
        }

        summary.end_time = Utc::now();

        let stats = ctx.limiter.stats();
        info!(
            "Run {} finished in {}ms: {} processed, {} skipped, {} failed ({} group lanes, {:.0}% waited)",
            run_id,
            summary.duration().num_milliseconds(),
            summary.processed,
            summary.skipped,
            summary.failed,
            stats.acquired,
            stats.wait_rate() * 100.0
        );

        Ok(summary)
    }

    async fn process_page(&self, ctx: &RunContext, entries: &[ChangeLogEntry]) -> Result<PageReport> {
        let mut report = PageReport {
            entries: entries.len(),
            ..Default::default()
        };

        let Grouping { groups, skipped } = group_entries(entries, self.config.unknown_tables);
        for notice in skipped {
            report.skip(notice);
        }

        let lanes = assign_lanes(groups);
        let results = join_all(lanes.iter().map(|lane| self.run_lane(ctx, lane))).await;
        for lane_report in results {
            report.merge(lane_report?);
        }

        Ok(report)
    }

    /// Run a lane's groups one after another under one limiter permit
    async fn run_lane(&self, ctx: &RunContext, lane: &[TableGroup]) -> Result<PageReport> {
        let _permit = ctx.limiter.acquire().await?;
        let mut report = PageReport::default();
        for group in lane {
            report.merge(self.process_group(ctx, group).await);
        }
        Ok(report)
    }

    /// Transfer one group, turning a failure into one error per key
    ///
    /// Rows committed before a cascade failure still count as processed.
    async fn process_group(&self, ctx: &RunContext, group: &TableGroup) -> PageReport {
        let (mut report, links) = match self.transfer_group(ctx, group).await {
            Ok(done) => done,
            Err(err) => {
                return PageReport {
                    errors: key_errors(&err),
                    ..Default::default()
                };
            }
        };

        if let Some(links) = links {
            match self.cascade_group(ctx, group, &links).await {
                Ok(outcome) => {
                    report.processed += outcome.written;
                    report.skipped.extend(outcome.skipped);
                }
                Err(err) => report.errors.extend(key_errors(&err)),
            }
        }

        report
    }

    /// Resolve, transform and write a group's own table
    ///
    /// Returns the link values for the cascade, if the table has one.
    async fn transfer_group(
        &self,
        ctx: &RunContext,
        group: &TableGroup,
    ) -> Result<(PageReport, Option<Vec<String>>), TransferError> {
        let spec = &group.spec;
        let fail = |cause: anyhow::Error| TransferError::new(spec.name(), group.keys.clone(), cause);
        let mut report = PageReport::default();

        let resolved = ctx.resolver.resolve(spec, &group.keys).await.map_err(fail)?;
        for key in resolved.missing_keys {
            report.skip(SkipNotice {
                log_id: None,
                table: Some(spec.name().to_string()),
                entity_key: Some(key),
                reason: SkipReason::NoSourceData,
            });
        }
        if resolved.rows.is_empty() {
            return Ok((report, None));
        }

        let rows: Vec<Record> = resolved.rows.iter().map(|r| transform_with(spec, r)).collect();
        let links = spec.cascade.as_ref().map(|cascade| {
            rows.iter()
                .filter(|r| r.key(spec.key_column).is_some())
                .filter_map(|r| r.key(cascade.link_column))
                .collect()
        });

        let outcome = ctx.upserts.upsert(spec, rows, &group.keys).await?;
        report.processed += outcome.written;
        report.skipped.extend(outcome.skipped);

        Ok((report, links))
    }

    /// Refresh the linked table's rows after the group's own write committed
    async fn cascade_group(
        &self,
        ctx: &RunContext,
        group: &TableGroup,
        links: &[String],
    ) -> Result<UpsertOutcome, TransferError> {
        let spec = &group.spec;
        let Some(cascade) = &spec.cascade else {
            return Ok(UpsertOutcome::default());
        };
        let fail = |cause: anyhow::Error| TransferError::new(cascade.table, group.keys.clone(), cause);

        let linked = registry()
            .get(cascade.table)
            .ok_or_else(|| fail(anyhow!("cascade target {} is not registered", cascade.table)))?;

        let rows = ctx
            .resolver
            .resolve_by_column(linked, cascade.link_column, links)
            .await
            .map_err(fail)?;
        if rows.is_empty() {
            return Ok(UpsertOutcome::default());
        }

        let rows: Vec<Record> = rows.iter().map(|r| transform_with(linked, r)).collect();
        ctx.upserts.upsert(linked, rows, &group.keys).await
    }

    /// Page summary: counts, then a bounded sample of warnings and errors
    fn log_page(&self, page: usize, report: &PageReport) {
        let sample = self.config.error_sample_size;

        info!(
            "Page {}: {} entries, {} rows written, {} skipped, {} errors ({:.2}% error rate)",
            page,
            report.entries,
            report.processed,
            report.skipped.len(),
            report.errors.len(),
            report.error_rate()
        );

        if !report.skipped.is_empty() {
            warn!(
                "Page {}: {} warnings (showing {})",
                page,
                report.skipped.len(),
                report.skipped.len().min(sample)
            );
            for notice in report.skipped.iter().take(sample) {
                warn!("  {}", notice);
            }
        }

        if !report.errors.is_empty() {
            error!(
                "Page {}: {} errors (showing {})",
                page,
                report.errors.len(),
                report.errors.len().min(sample)
            );
            for err in report.errors.iter().take(sample) {
                error!("  {} [{}]: {}", err.table, err.entity_key, err.message);
            }
        }
    }
}

/// One error per key the failed group covered
fn key_errors(err: &TransferError) -> Vec<KeyError> {
    let at = Utc::now();
    let message = format!("{:#}", err.cause);
    err.entity_keys
        .iter()
        .map(|key| KeyError {
            table: err.table.clone(),
            entity_key: key.clone(),
            message: message.clone(),
            at,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::sync::registry::UnknownTablePolicy;
    use crate::sync::types::Value;
    use serde_json::json;

    fn engine_with(store: &MemoryStore, config: EngineConfig) -> SyncEngine {
        let store = Arc::new(store.clone());
        SyncEngine::new(store.clone(), store.clone(), store, config)
    }

    fn engine(store: &MemoryStore) -> SyncEngine {
        engine_with(store, EngineConfig::builder().page_pause(std::time::Duration::ZERO).build())
    }

    async fn log(store: &MemoryStore, id: i64, key: Option<&str>, table: Option<&str>) {
        store.push_entry(ChangeLogEntry::new(id, key, table)).await;
    }

    fn sorted(rows: Vec<Record>) -> Vec<String> {
        let mut out: Vec<String> = rows.iter().map(|r| r.to_json().to_string()).collect();
        out.sort();
        out
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let store = MemoryStore::new();
        log(&store, 1, Some("R001"), Some("farmers_kyc1")).await;
        log(&store, 2, Some("R002"), Some("unknown_table")).await;
        log(&store, 3, None, Some("farmers_kyc2")).await;
        store
            .add_source_rows(
                "farmers_kyc1",
                vec![Record::from_json(&json!({"kyc1_id": 1, "rsbsa_no": "R001", "first_name": "juan"}))],
            )
            .await;

        let summary = engine(&store).run_once().await.unwrap();

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.failed, 0);
        assert!(summary.end_time >= summary.start_time);

        let target = store.target_rows("farmers_kyc1").await;
        assert_eq!(target.len(), 1);
        assert_eq!(target[0].get("first_name"), Some(&Value::from("JUAN")));
    }

    #[tokio::test]
    async fn test_no_pending_entries_is_idle() {
        let store = MemoryStore::new();
        log(&store, 1, None, None).await;

        let summary = engine(&store).run_once().await.unwrap();

        assert!(summary.is_idle());
        assert!(store.source_queries().await.is_empty());
    }

    #[tokio::test]
    async fn test_null_table_is_skipped_without_resolving() {
        let store = MemoryStore::new();
        log(&store, 1, Some("R001"), None).await;
        log(&store, 2, Some("R002"), Some("farmers_kyc3")).await;

        let summary = engine(&store).run_once().await.unwrap();

        // R002 has no source rows either
        assert_eq!(summary.skipped, 2);
        let queries = store.source_queries().await;
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].table, "farmers_kyc3");
        assert_eq!(queries[0].values, vec!["R002".to_string()]);
    }

    #[tokio::test]
    async fn test_ownership_cascades_to_parcels() {
        let store = MemoryStore::new();
        log(&store, 1, Some("K"), Some("farmparcelownership")).await;
        store
            .add_source_rows(
                "farmparcelownership",
                vec![Record::from_json(&json!({
                    "farmownID": 7, "rsbsa_no": "K", "parcel_id": "P", "encoder_fullname": "ana"
                }))],
            )
            .await;
        store
            .add_source_rows(
                "farmparcel",
                vec![
                    Record::from_json(&json!({"parcel_id": "P", "owner_rsbsa_no": "K", "desc_location": "sitio uno"})),
                    Record::from_json(&json!({"parcel_id": "Q", "owner_rsbsa_no": "X"})),
                ],
            )
            .await;

        let summary = engine(&store).run_once().await.unwrap();

        assert_eq!(summary.processed, 2);
        let parcels = store.target_rows("farmparcel").await;
        assert_eq!(parcels.len(), 1);
        assert_eq!(parcels[0].get("parcel_id"), Some(&Value::from("P")));
        assert_eq!(parcels[0].get("desc_location"), Some(&Value::from("SITIO UNO")));
        let owners = store.target_rows("farmparcelownership").await;
        assert_eq!(owners[0].get("encoder_fullname"), Some(&Value::from("ANA")));
    }

    #[tokio::test]
    async fn test_failed_cascade_keeps_committed_owner_rows() {
        let store = MemoryStore::new();
        log(&store, 1, Some("K"), Some("farmparcelownership")).await;
        store
            .add_source_rows(
                "farmparcelownership",
                vec![Record::from_json(&json!({"farmownID": 7, "rsbsa_no": "K", "parcel_id": "P"}))],
            )
            .await;
        store
            .add_source_rows(
                "farmparcel",
                vec![Record::from_json(&json!({"parcel_id": "P", "owner_rsbsa_no": "K"}))],
            )
            .await;
        store.fail_writes_to("farmparcel").await;

        let summary = engine(&store).run_once().await.unwrap();

        assert_eq!(store.target_rows("farmparcelownership").await.len(), 1);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.errors[0].table, "farmparcel");
        assert_eq!(summary.errors[0].entity_key, "K");
    }

    #[tokio::test]
    async fn test_parcel_entry_replaces_owned_parcels() {
        let store = MemoryStore::new();
        log(&store, 1, Some("K"), Some("farmparcel")).await;
        store
            .add_source_rows(
                "farmparcelownership",
                vec![
                    Record::from_json(&json!({"farmownID": 1, "rsbsa_no": "K", "parcel_id": "P1"})),
                    Record::from_json(&json!({"farmownID": 2, "rsbsa_no": "K", "parcel_id": "P2"})),
                ],
            )
            .await;
        let parcels = |p1_location: &str| {
            vec![
                Record::from_json(&json!({"parcel_id": "P1", "owner_rsbsa_no": "K", "desc_location": p1_location})),
                Record::from_json(&json!({"parcel_id": "P2", "owner_rsbsa_no": "K"})),
                Record::from_json(&json!({"parcel_id": "Q", "owner_rsbsa_no": "X"})),
            ]
        };
        store.set_source_rows("farmparcel", parcels("old site")).await;
        let engine = engine(&store);
        engine.run_once().await.unwrap();

        store.set_source_rows("farmparcel", parcels("new site")).await;
        let summary = engine.run_once().await.unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped, 0);
        let mut target = store.target_rows("farmparcel").await;
        target.sort_by_key(|r| r.key("parcel_id"));
        assert_eq!(target.len(), 2);
        assert_eq!(target[0].get("desc_location"), Some(&Value::from("NEW SITE")));
        assert_eq!(target[1].get("parcel_id"), Some(&Value::from("P2")));
        assert!(store.target_rows("farmparcelownership").await.is_empty());

        let queries = store.source_queries().await;
        assert_eq!(queries[0].table, "farmparcelownership");
        assert_eq!(queries[1].table, "farmparcel");
        assert_eq!(queries[1].column, "parcel_id");
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let store = MemoryStore::new();
        log(&store, 1, Some("R001"), Some("farmers_kyc1")).await;
        log(&store, 2, Some("R001"), Some("farmers_livelihood")).await;
        log(&store, 3, Some("R002"), Some("farmers_livelihood")).await;
        store
            .add_source_rows(
                "farmers_kyc1",
                vec![Record::from_json(&json!({"kyc1_id": 1, "rsbsa_no": "R001", "surname": "cruz"}))],
            )
            .await;
        store
            .add_source_rows(
                "farmers_livelihood",
                vec![
                    Record::from_json(&json!({"farmlivelihoodID": 1, "rsbsa_no": "R001", "livelihood": "farmer"})),
                    Record::from_json(&json!({"farmlivelihoodID": 2, "rsbsa_no": "R001", "livelihood": "fisher"})),
                    Record::from_json(&json!({"farmlivelihoodID": 3, "rsbsa_no": "R002", "livelihood": "farmer"})),
                ],
            )
            .await;
        let engine = engine(&store);

        engine.run_once().await.unwrap();
        let kyc1 = sorted(store.target_rows("farmers_kyc1").await);
        let livelihood = sorted(store.target_rows("farmers_livelihood").await);

        engine.run_once().await.unwrap();
        assert_eq!(sorted(store.target_rows("farmers_kyc1").await), kyc1);
        assert_eq!(sorted(store.target_rows("farmers_livelihood").await), livelihood);
        assert_eq!(livelihood.len(), 3);
    }

    #[tokio::test]
    async fn test_one_to_many_reflects_current_source() {
        let store = MemoryStore::new();
        log(&store, 1, Some("K"), Some("farmers_fca")).await;
        store
            .set_source_rows(
                "farmers_fca",
                vec![
                    Record::from_json(&json!({"id": 1, "rsbsa_no": "K", "fca_name": "A"})),
                    Record::from_json(&json!({"id": 2, "rsbsa_no": "K", "fca_name": "B"})),
                ],
            )
            .await;
        let engine = engine(&store);
        engine.run_once().await.unwrap();

        store
            .set_source_rows(
                "farmers_fca",
                vec![Record::from_json(&json!({"id": 3, "rsbsa_no": "K", "fca_name": "C"}))],
            )
            .await;
        engine.run_once().await.unwrap();

        let target = store.target_rows("farmers_fca").await;
        assert_eq!(target.len(), 1);
        assert_eq!(target[0].get("fca_name"), Some(&Value::from("C")));
    }

    #[tokio::test]
    async fn test_failed_group_is_isolated() {
        let store = MemoryStore::new();
        log(&store, 1, Some("R001"), Some("farmers_fca")).await;
        log(&store, 2, Some("R002"), Some("farmers_fca")).await;
        log(&store, 3, Some("R001"), Some("farmers_kyc4")).await;
        store
            .add_source_rows(
                "farmers_fca",
                vec![
                    Record::from_json(&json!({"id": 1, "rsbsa_no": "R001", "fca_name": "A"})),
                    Record::from_json(&json!({"id": 2, "rsbsa_no": "R002", "fca_name": "B"})),
                ],
            )
            .await;
        store
            .add_source_rows(
                "farmers_kyc4",
                vec![Record::from_json(&json!({"kyc4_id": 1, "rsbsa_no": "R001", "deceased_reason": "n/a"}))],
            )
            .await;
        store.fail_writes_to("farmers_fca").await;

        let summary = engine(&store).run_once().await.unwrap();

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.errors.len(), 2);
        assert!(summary.errors.iter().all(|e| e.table == "farmers_fca"));
        assert!(store.target_rows("farmers_fca").await.is_empty());
        assert_eq!(store.target_rows("farmers_kyc4").await.len(), 1);
    }

    #[tokio::test]
    async fn test_source_read_failure_fails_only_that_group() {
        let store = MemoryStore::new();
        log(&store, 1, Some("R001"), Some("farmers_attachments")).await;
        log(&store, 2, Some("R001"), Some("farmers_kyc2")).await;
        store
            .add_source_rows(
                "farmers_kyc2",
                vec![Record::from_json(&json!({"kyc2_id": 1, "rsbsa_no": "R001", "spouse": "maria"}))],
            )
            .await;
        store.fail_reads_from("farmers_attachments").await;

        let summary = engine(&store).run_once().await.unwrap();

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.errors[0].entity_key, "R001");
    }

    #[tokio::test]
    async fn test_change_log_failure_aborts_run() {
        let store = MemoryStore::new();
        log(&store, 1, Some("R001"), Some("farmers_kyc1")).await;
        store.take_change_log_down().await;

        let err = engine(&store).run_once().await.unwrap_err();
        assert!(format!("{:#}", err).contains("change log unreachable"));
    }

    #[tokio::test]
    async fn test_pages_through_the_whole_log() {
        let store = MemoryStore::new();
        let mut rows = Vec::new();
        for i in 1..=5 {
            let key = format!("R{:03}", i);
            log(&store, i, Some(&key), Some("farmers_kyc1")).await;
            rows.push(Record::from_json(&json!({"kyc1_id": i, "rsbsa_no": key})));
        }
        log(&store, 6, None, None).await;
        store.add_source_rows("farmers_kyc1", rows).await;

        let config = EngineConfig::builder()
            .page_size(2)
            .max_concurrent_groups(1)
            .page_pause(std::time::Duration::ZERO)
            .build();
        let summary = engine_with(&store, config).run_once().await.unwrap();

        assert_eq!(summary.processed, 5);
        assert_eq!(summary.skipped, 1);
        assert_eq!(store.target_rows("farmers_kyc1").await.len(), 5);
    }

    #[tokio::test]
    async fn test_passthrough_copies_unknown_tables() {
        let store = MemoryStore::new();
        log(&store, 1, Some("R001"), Some("legacy_notes")).await;
        store.create_target_table("legacy_notes").await;
        store
            .add_source_rows(
                "legacy_notes",
                vec![Record::from_json(&json!({"rsbsa_no": "R001", "note": "keep as is"}))],
            )
            .await;

        let config = EngineConfig::builder()
            .unknown_tables(UnknownTablePolicy::Passthrough)
            .page_pause(std::time::Duration::ZERO)
            .build();
        let summary = engine_with(&store, config).run_once().await.unwrap();

        assert_eq!(summary.processed, 1);
        let target = store.target_rows("legacy_notes").await;
        assert_eq!(target[0].get("note"), Some(&Value::from("keep as is")));
        assert!(store.ensured_tables().await.is_empty());
    }
}
