//! RSBSA registry ETL
//!
//! Copies farmer-registry records from the source database into the
//! aggregation hub, driven by the source's change log.

pub mod cli;
pub mod config;
pub mod logging;
pub mod store;
pub mod sync;

pub use config::{DbConfig, EngineConfig, EtlConfig};
pub use sync::{RunSummary, SyncEngine};
