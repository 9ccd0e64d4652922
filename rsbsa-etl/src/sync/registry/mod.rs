//! Static registry of the tables the engine knows how to transfer
//!
//! Each entry carries the target schema, how rows for an entity key are found
//! in the source, how they are written to the target, and which text fields are
//! normalized on the way. Adding a table means adding an entry in `tables.rs`;
//! no control flow changes.

mod tables;

use std::borrow::Cow;
use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::types::ENTITY_KEY_COLUMN;

/// How a target table relates to the entity key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// At most one row per key, updated in place
    OneToOne,
    /// Any number of rows per key, replaced wholesale
    OneToMany,
}

/// How source rows are located for a batch of entity keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// `SELECT * FROM table WHERE rsbsa_no IN (...)`
    Direct,
    /// Look up link values owned by each key in a junction table, then select
    /// rows by those link values
    ViaJunction {
        junction: &'static str,
        link_column: &'static str,
    },
}

/// A second transfer triggered by a successful group
///
/// The linked rows are read by `link_column` values taken from the rows just
/// written and transferred into `table`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cascade {
    pub table: &'static str,
    pub link_column: &'static str,
}

/// One target column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static str,
}

pub(crate) const fn col(name: &'static str, sql_type: &'static str) -> Column {
    Column { name, sql_type }
}

/// What to do with change-log entries naming a table outside the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownTablePolicy {
    /// Count the entry as skipped without touching either store (default)
    #[default]
    Skip,
    /// Copy rows by `rsbsa_no` as-is into an existing target table of the same name
    Passthrough,
}

impl std::str::FromStr for UnknownTablePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(UnknownTablePolicy::Skip),
            "passthrough" | "pass-through" => Ok(UnknownTablePolicy::Passthrough),
            other => Err(format!("unknown table policy '{}' (expected skip or passthrough)", other)),
        }
    }
}

/// Static metadata for one transferable table
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub name: Cow<'static, str>,
    /// Target schema; empty for passthrough tables, which must already exist
    pub columns: &'static [Column],
    pub primary_key: Option<&'static str>,
    /// Primary key is an AUTO_INCREMENT surrogate, never overwritten on update
    pub surrogate_key: bool,
    pub indexes: &'static [&'static str],
    pub cardinality: Cardinality,
    /// Column identifying the rows replaced for one key
    pub key_column: &'static str,
    pub uppercase_fields: &'static [&'static str],
    pub resolution: Resolution,
    pub cascade: Option<Cascade>,
}

impl TableSpec {
    /// Spec for an unregistered table under the passthrough policy
    pub fn passthrough(name: &str) -> Self {
        Self {
            name: Cow::Owned(name.to_string()),
            columns: &[],
            primary_key: None,
            surrogate_key: false,
            indexes: &[],
            cardinality: Cardinality::OneToMany,
            key_column: ENTITY_KEY_COLUMN,
            uppercase_fields: &[],
            resolution: Resolution::Direct,
            cascade: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_schema(&self) -> bool {
        !self.columns.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn is_one_to_one(&self) -> bool {
        self.cardinality == Cardinality::OneToOne
    }

    /// Target tables a group for this table writes to
    pub fn written_tables(&self) -> Vec<&str> {
        let mut tables = vec![self.name()];
        if let Some(cascade) = &self.cascade {
            tables.push(cascade.table);
        }
        tables
    }

    /// Columns an update may overwrite: everything but the key and the surrogate id
    pub fn is_updatable(&self, column: &str) -> bool {
        if column == self.key_column {
            return false;
        }
        !(self.surrogate_key && self.primary_key == Some(column))
    }
}

/// Outcome of looking a change-log table name up
#[derive(Debug, Clone)]
pub enum Lookup<'a> {
    Registered(&'a TableSpec),
    Passthrough(TableSpec),
    Unknown,
}

/// Plain SQL identifier, the only shape a passthrough table name may take
static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("valid identifier regex"));

pub fn is_plain_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Lookup table from table name to spec
#[derive(Debug)]
pub struct TableRegistry {
    specs: Vec<TableSpec>,
    by_name: HashMap<String, usize>,
}

impl TableRegistry {
    pub fn new(specs: Vec<TableSpec>) -> Self {
        let by_name = specs
            .iter()
            .enumerate()
            .map(|(idx, spec)| (spec.name().to_string(), idx))
            .collect();
        Self { specs, by_name }
    }

    pub fn get(&self, name: &str) -> Option<&TableSpec> {
        self.by_name.get(name).map(|&idx| &self.specs[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn specs(&self) -> &[TableSpec] {
        &self.specs
    }

    /// Resolve a change-log table name under the given policy
    pub fn lookup(&self, name: &str, policy: UnknownTablePolicy) -> Lookup<'_> {
        if let Some(spec) = self.get(name) {
            return Lookup::Registered(spec);
        }
        match policy {
            UnknownTablePolicy::Passthrough if is_plain_identifier(name) => {
                Lookup::Passthrough(TableSpec::passthrough(name))
            }
            _ => Lookup::Unknown,
        }
    }
}

static REGISTRY: Lazy<TableRegistry> = Lazy::new(|| TableRegistry::new(tables::all()));

/// The registry of every table synchronized into the aggregation hub
pub fn registry() -> &'static TableRegistry {
    &REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_all_tables() {
        let names: Vec<_> = registry().specs().iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names.len(), 12);
        for name in [
            "farmers_kyc1",
            "farmers_kyc2",
            "farmers_kyc3",
            "farmers_kyc4",
            "farmers_attachments",
            "farmers_fca",
            "farmers_form_attachments",
            "farmers_livelihood",
            "farmparcelactivity",
            "farmparcelattachments",
            "farmparcel",
            "farmparcelownership",
        ] {
            assert!(registry().contains(name), "missing {}", name);
        }
    }

    #[test]
    fn test_kyc_tables_are_one_to_one() {
        for name in ["farmers_kyc1", "farmers_kyc2", "farmers_kyc3", "farmers_kyc4"] {
            assert_eq!(registry().get(name).unwrap().cardinality, Cardinality::OneToOne);
        }
        assert_eq!(
            registry().get("farmers_livelihood").unwrap().cardinality,
            Cardinality::OneToMany
        );
    }

    #[test]
    fn test_parcel_resolution_and_cascade() {
        let parcel = registry().get("farmparcel").unwrap();
        assert_eq!(parcel.key_column, "parcel_id");
        assert_eq!(
            parcel.resolution,
            Resolution::ViaJunction {
                junction: "farmparcelownership",
                link_column: "parcel_id"
            }
        );

        let ownership = registry().get("farmparcelownership").unwrap();
        assert_eq!(ownership.written_tables(), vec!["farmparcelownership", "farmparcel"]);
    }

    #[test]
    fn test_key_column_is_in_schema() {
        for spec in registry().specs() {
            assert!(spec.has_column(spec.key_column), "{} lacks {}", spec.name(), spec.key_column);
            assert_eq!(spec.primary_key, Some(spec.columns[0].name));
        }
    }

    #[test]
    fn test_updatable_columns() {
        let kyc1 = registry().get("farmers_kyc1").unwrap();
        assert!(!kyc1.is_updatable("rsbsa_no"));
        assert!(!kyc1.is_updatable("kyc1_id"));
        assert!(kyc1.is_updatable("surname"));
    }

    #[test]
    fn test_lookup_policy() {
        assert!(matches!(
            registry().lookup("farmers_kyc1", UnknownTablePolicy::Skip),
            Lookup::Registered(_)
        ));
        assert!(matches!(
            registry().lookup("unknown_table", UnknownTablePolicy::Skip),
            Lookup::Unknown
        ));
        match registry().lookup("unknown_table", UnknownTablePolicy::Passthrough) {
            Lookup::Passthrough(spec) => {
                assert_eq!(spec.name(), "unknown_table");
                assert!(!spec.has_schema());
            }
            other => panic!("expected passthrough, got {:?}", other),
        }
        assert!(matches!(
            registry().lookup("x; DROP TABLE farmers_kyc1", UnknownTablePolicy::Passthrough),
            Lookup::Unknown
        ));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("skip".parse::<UnknownTablePolicy>(), Ok(UnknownTablePolicy::Skip));
        assert_eq!(
            "PassThrough".parse::<UnknownTablePolicy>(),
            Ok(UnknownTablePolicy::Passthrough)
        );
        assert!("merge".parse::<UnknownTablePolicy>().is_err());
    }
}
