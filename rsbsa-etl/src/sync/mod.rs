//! Batched synchronization of the RSBSA registry
//!
//! This module reads the change log, resolves the affected source rows,
//! normalizes them and writes them into the aggregation hub, one table group
//! at a time.

pub mod types;
pub mod registry;
pub mod transform;
pub mod resolve;
pub mod upsert;
pub mod group;
pub mod concurrency;
pub mod engine;

pub use types::*;
pub use registry::{registry, Cardinality, Lookup, Resolution, TableRegistry, TableSpec, UnknownTablePolicy};
pub use transform::{transform, transform_with};
pub use resolve::{Resolved, SourceResolver};
pub use upsert::{TransferError, UpsertEngine, UpsertOutcome};
pub use group::{assign_lanes, group_entries, TableGroup};
pub use concurrency::ConcurrencyLimiter;
pub use engine::SyncEngine;
