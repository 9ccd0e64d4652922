//! Grouping of change-log entries into per-table work units

use std::collections::{HashMap, HashSet};

use super::registry::{registry, Lookup, TableSpec, UnknownTablePolicy};
use super::types::{ChangeLogEntry, SkipNotice, SkipReason};

/// All distinct entity keys for one table within a page
#[derive(Debug, Clone)]
pub struct TableGroup {
    pub spec: TableSpec,
    /// Distinct keys in first-seen order
    pub keys: Vec<String>,
}

impl TableGroup {
    pub fn table(&self) -> &str {
        self.spec.name()
    }
}

/// A page split into table groups plus the entries that cannot be processed
#[derive(Debug, Default)]
pub struct Grouping {
    pub groups: Vec<TableGroup>,
    pub skipped: Vec<SkipNotice>,
}

/// Group a page of entries by table, in first-seen table order
pub fn group_entries(entries: &[ChangeLogEntry], policy: UnknownTablePolicy) -> Grouping {
    let mut grouping = Grouping::default();
    let mut by_table: HashMap<String, usize> = HashMap::new();
    let mut seen_keys: Vec<HashSet<String>> = Vec::new();

    for entry in entries {
        let notice = |reason| SkipNotice {
            log_id: Some(entry.log_id),
            table: entry.table_name.clone(),
            entity_key: entry.entity_key.clone(),
            reason,
        };

        let (Some(key), Some(table)) = (trimmed(&entry.entity_key), trimmed(&entry.table_name))
        else {
            grouping.skipped.push(notice(SkipReason::MissingField));
            continue;
        };

        let idx = match by_table.get(table) {
            Some(&idx) => idx,
            None => {
                let spec = match registry().lookup(table, policy) {
                    Lookup::Registered(spec) => spec.clone(),
                    Lookup::Passthrough(spec) => spec,
                    Lookup::Unknown => {
                        grouping.skipped.push(notice(SkipReason::UnknownTable));
                        continue;
                    }
                };
                grouping.groups.push(TableGroup {
                    spec,
                    keys: Vec::new(),
                });
                seen_keys.push(HashSet::new());
                by_table.insert(table.to_string(), grouping.groups.len() - 1);
                grouping.groups.len() - 1
            }
        };

        let group = &mut grouping.groups[idx];
        if seen_keys[idx].insert(key.to_string()) {
            group.keys.push(key.to_string());
        }
    }

    grouping
}

fn trimmed(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Split groups into lanes that can run concurrently
///
/// Groups writing a common target table share a lane and run in order, so two
/// transactions never replace the same table's rows at once.
pub fn assign_lanes(groups: Vec<TableGroup>) -> Vec<Vec<TableGroup>> {
    let mut lanes: Vec<(HashSet<String>, Vec<TableGroup>)> = Vec::new();

    for group in groups {
        let tables: HashSet<String> = group
            .spec
            .written_tables()
            .into_iter()
            .map(str::to_string)
            .collect();

        let (overlapping, rest): (Vec<_>, Vec<_>) = lanes
            .into_iter()
            .partition(|(written, _)| !written.is_disjoint(&tables));

        let mut merged_tables = tables;
        let mut merged_groups = Vec::new();
        for (written, lane) in overlapping {
            merged_tables.extend(written);
            merged_groups.extend(lane);
        }
        merged_groups.push(group);

        lanes = rest;
        lanes.push((merged_tables, merged_groups));
    }

    lanes.into_iter().map(|(_, lane)| lane).collect()
}
