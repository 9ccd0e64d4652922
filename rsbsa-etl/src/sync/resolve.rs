//! Source row resolution for a batch of entity keys

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use log::debug;

use super::registry::{Resolution, TableSpec};
use super::types::{Record, ENTITY_KEY_COLUMN};
use crate::store::SourceStore;

/// Rows found for a key batch, plus the keys that found nothing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolved {
    pub rows: Vec<Record>,
    /// Requested keys without source rows, in request order
    pub missing_keys: Vec<String>,
}

/// Reads full source rows for entity keys according to each table's resolution rule
#[derive(Clone)]
pub struct SourceResolver {
    source: Arc<dyn SourceStore>,
}

impl SourceResolver {
    pub fn new(source: Arc<dyn SourceStore>) -> Self {
        Self { source }
    }

    /// Fetch the rows belonging to `keys` for one table
    pub async fn resolve(&self, spec: &TableSpec, keys: &[String]) -> Result<Resolved> {
        if keys.is_empty() {
            return Ok(Resolved::default());
        }

        match spec.resolution {
            Resolution::Direct => {
                let rows = self
                    .source
                    .select_in(spec.name(), ENTITY_KEY_COLUMN, keys)
                    .await?;
                let found: HashSet<String> = rows
                    .iter()
                    .filter_map(Record::entity_key)
                    .map(|key| collation_key(&key))
                    .collect();
                Ok(Resolved {
                    missing_keys: missing(keys, &found),
                    rows,
                })
            }
            Resolution::ViaJunction {
                junction,
                link_column,
            } => self.resolve_via(spec, keys, junction, link_column).await,
        }
    }

    /// Two hops: owned link values from the junction, then rows by link value
    async fn resolve_via(
        &self,
        spec: &TableSpec,
        keys: &[String],
        junction: &str,
        link_column: &str,
    ) -> Result<Resolved> {
        let links = self
            .source
            .select_in(junction, ENTITY_KEY_COLUMN, keys)
            .await?;

        let mut owned: Vec<(String, String)> = Vec::new();
        for link in &links {
            if let (Some(owner), Some(value)) = (link.entity_key(), link.key(link_column)) {
                owned.push((owner, value));
            }
        }

        let values = distinct(owned.iter().map(|(_, value)| value.clone()));
        debug!(
            "{}: {} keys own {} {} values via {}",
            spec.name(),
            keys.len(),
            values.len(),
            link_column,
            junction
        );

        let rows = self.resolve_by_column(spec, link_column, &values).await?;
        let present: HashSet<String> = rows
            .iter()
            .filter_map(|r| r.key(link_column))
            .map(|value| collation_key(&value))
            .collect();
        let found: HashSet<String> = owned
            .into_iter()
            .filter(|(_, value)| present.contains(&collation_key(value)))
            .map(|(owner, _)| collation_key(&owner))
            .collect();

        Ok(Resolved {
            missing_keys: missing(keys, &found),
            rows,
        })
    }

    /// Rows of `spec`'s table whose `column` matches one of `values`
    pub async fn resolve_by_column(
        &self,
        spec: &TableSpec,
        column: &str,
        values: &[String],
    ) -> Result<Vec<Record>> {
        let values = distinct(values.iter().cloned());
        if values.is_empty() {
            return Ok(Vec::new());
        }
        self.source.select_in(spec.name(), column, &values).await
    }
}

/// Keys absent from `found`, which holds collation keys
fn missing(keys: &[String], found: &HashSet<String>) -> Vec<String> {
    distinct(
        keys.iter()
            .filter(|k| !found.contains(&collation_key(k)))
            .cloned(),
    )
}

/// Key as the source's case-insensitive, PAD SPACE collation compares it
pub(crate) fn collation_key(key: &str) -> String {
    key.trim_end_matches(' ').to_ascii_lowercase()
}

/// Deduplicate, keeping first-seen order
pub(crate) fn distinct(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::sync::registry::registry;
    use serde_json::json;

    fn keys(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_direct_resolution_reports_missing_keys() {
        let store = MemoryStore::new();
        store
            .add_source_rows(
                "farmers_fca",
                vec![
                    Record::from_json(&json!({"fca_id": "F1", "rsbsa_no": "R001", "fca_name": "a"})),
                    Record::from_json(&json!({"fca_id": "F2", "rsbsa_no": "R001", "fca_name": "b"})),
                    Record::from_json(&json!({"fca_id": "F3", "rsbsa_no": "R009", "fca_name": "c"})),
                ],
            )
            .await;
        let resolver = SourceResolver::new(Arc::new(store.clone()));

        let spec = registry().get("farmers_fca").unwrap();
        let resolved = resolver.resolve(spec, &keys(&["R001", "R002"])).await.unwrap();

        assert_eq!(resolved.rows.len(), 2);
        assert_eq!(resolved.missing_keys, keys(&["R002"]));

        let queries = store.source_queries().await;
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].column, "rsbsa_no");
    }

    #[tokio::test]
    async fn test_empty_keys_never_query() {
        let store = MemoryStore::new();
        let resolver = SourceResolver::new(Arc::new(store.clone()));

        let resolved = resolver
            .resolve(registry().get("farmers_kyc1").unwrap(), &[])
            .await
            .unwrap();

        assert_eq!(resolved, Resolved::default());
        assert!(store.source_queries().await.is_empty());
    }

    #[tokio::test]
    async fn test_parcels_resolve_through_ownership() {
        let store = MemoryStore::new();
        store
            .add_source_rows(
                "farmparcelownership",
                vec![
                    Record::from_json(&json!({"rsbsa_no": "R001", "parcel_id": "P1"})),
                    Record::from_json(&json!({"rsbsa_no": "R001", "parcel_id": "P2"})),
                    Record::from_json(&json!({"rsbsa_no": "R002", "parcel_id": "P1"})),
                    Record::from_json(&json!({"rsbsa_no": "R003", "parcel_id": "P404"})),
                ],
            )
            .await;
        store
            .add_source_rows(
                "farmparcel",
                vec![
                    Record::from_json(&json!({"parcel_id": "P1", "owner_rsbsa_no": "R001"})),
                    Record::from_json(&json!({"parcel_id": "P2", "owner_rsbsa_no": "R001"})),
                    Record::from_json(&json!({"parcel_id": "P3", "owner_rsbsa_no": "R005"})),
                ],
            )
            .await;
        let resolver = SourceResolver::new(Arc::new(store.clone()));

        let spec = registry().get("farmparcel").unwrap();
        let resolved = resolver
            .resolve(spec, &keys(&["R001", "R002", "R003", "R004"]))
            .await
            .unwrap();

        let mut parcels: Vec<_> = resolved.rows.iter().filter_map(|r| r.key("parcel_id")).collect();
        parcels.sort();
        assert_eq!(parcels, keys(&["P1", "P2"]));
        assert_eq!(resolved.missing_keys, keys(&["R003", "R004"]));

        let queries = store.source_queries().await;
        assert_eq!(queries[1].table, "farmparcel");
        assert_eq!(queries[1].values, keys(&["P1", "P2", "P404"]));
    }

    #[tokio::test]
    async fn test_keys_matched_by_collation_are_not_missing() {
        let store = MemoryStore::new();
        store
            .add_source_rows(
                "farmers_kyc1",
                vec![Record::from_json(&json!({"kyc1_id": 1, "rsbsa_no": "r001 "}))],
            )
            .await;
        let resolver = SourceResolver::new(Arc::new(store));

        let resolved = resolver
            .resolve(registry().get("farmers_kyc1").unwrap(), &keys(&["R001", "R002"]))
            .await
            .unwrap();

        assert_eq!(resolved.missing_keys, keys(&["R002"]));
    }

    #[test]
    fn test_missing_compares_collation_keys() {
        let found: HashSet<String> = ["r001".to_string()].into_iter().collect();
        assert_eq!(missing(&keys(&["R001  ", "R002", "R001"]), &found), keys(&["R002"]));
    }

    #[test]
    fn test_distinct_keeps_first_seen_order() {
        assert_eq!(
            distinct(keys(&["b", "a", "b", "c", "a"])),
            keys(&["b", "a", "c"])
        );
    }
}
