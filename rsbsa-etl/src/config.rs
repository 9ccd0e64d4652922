//! ETL configuration with builder pattern
//!
//! Connection settings for the source and target databases plus the engine's
//! paging, concurrency and reporting knobs. Values come from the environment
//! (optionally a `.env` file) and fall back to sane defaults.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::sync::registry::UnknownTablePolicy;

/// Default change-log table in the source database
pub const DEFAULT_CHANGE_LOG_TABLE: &str = "etl_logger_profiling";

/// Complete configuration for one ETL process
#[derive(Debug, Clone)]
pub struct EtlConfig {
    pub source: DbConfig,
    pub target: DbConfig,
    pub engine: EngineConfig,
}

/// Connection settings for one MySQL database
#[derive(Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Upper bound on pooled connections; callers queue when exhausted
    pub max_connections: u32,
    /// How long a caller waits for a pooled connection before failing
    pub acquire_timeout: Duration,
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

/// Sync engine behavior
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Change-log entries fetched per page
    pub page_size: u64,
    /// Table groups of one page processed concurrently
    pub max_concurrent_groups: usize,
    /// Cooperative pause between pages
    pub page_pause: Duration,
    /// Errors and warnings logged per page before summarizing
    pub error_sample_size: usize,
    /// Handling of change-log entries naming unregistered tables
    pub unknown_tables: UnknownTablePolicy,
    pub change_log_table: String,
    /// Keys per `IN (...)` query against the source
    pub source_chunk_size: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: String::new(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: 50_000,
            max_concurrent_groups: 4,
            page_pause: Duration::from_millis(100),
            error_sample_size: 5,
            unknown_tables: UnknownTablePolicy::Skip,
            change_log_table: DEFAULT_CHANGE_LOG_TABLE.to_string(),
            source_chunk_size: 5_000,
        }
    }
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            source: DbConfig::default(),
            target: DbConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Create a new builder for EngineConfig
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    /// Small pages processed one group at a time, for busy source databases
    pub fn conservative() -> Self {
        Self {
            page_size: 500,
            max_concurrent_groups: 1,
            page_pause: Duration::from_millis(500),
            ..Self::default()
        }
    }

    /// No pause and no parallelism, for following a run in the logs
    pub fn sequential() -> Self {
        Self {
            max_concurrent_groups: 1,
            page_pause: Duration::ZERO,
            ..Self::default()
        }
    }
}

impl DbConfig {
    /// Load `{prefix}_DB_HOST`, `{prefix}_DB_PORT`, `{prefix}_DB_USER`,
    /// `{prefix}_DB_PASSWORD`, `{prefix}_DB_NAME` and the pool settings
    pub fn from_env(prefix: &str) -> Result<Self> {
        let defaults = Self::default();
        let var = |name: &str| format!("{}_DB_{}", prefix, name);

        Ok(Self {
            host: env_string(&var("HOST")).unwrap_or(defaults.host),
            port: env_parse(&var("PORT"))?.unwrap_or(defaults.port),
            user: env_string(&var("USER")).unwrap_or(defaults.user),
            password: env_string(&var("PASSWORD")).unwrap_or(defaults.password),
            database: env_string(&var("NAME"))
                .with_context(|| format!("{} is not set", var("NAME")))?,
            max_connections: env_parse(&var("POOL_SIZE"))?.unwrap_or(defaults.max_connections),
            acquire_timeout: env_parse(&var("ACQUIRE_TIMEOUT_SECS"))?
                .map(Duration::from_secs)
                .unwrap_or(defaults.acquire_timeout),
        })
    }
}

impl EngineConfig {
    /// Load the `ETL_*` variables over the defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let unknown_tables = match env_string("ETL_UNKNOWN_TABLES") {
            Some(raw) => raw
                .parse::<UnknownTablePolicy>()
                .map_err(anyhow::Error::msg)
                .context("Invalid ETL_UNKNOWN_TABLES")?,
            None => defaults.unknown_tables,
        };

        Ok(Self {
            page_size: env_parse("ETL_PAGE_SIZE")?.unwrap_or(defaults.page_size),
            max_concurrent_groups: env_parse("ETL_MAX_CONCURRENT_GROUPS")?
                .unwrap_or(defaults.max_concurrent_groups),
            page_pause: env_parse("ETL_PAGE_PAUSE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.page_pause),
            error_sample_size: env_parse("ETL_ERROR_SAMPLE_SIZE")?
                .unwrap_or(defaults.error_sample_size),
            unknown_tables,
            change_log_table: env_string("ETL_CHANGE_LOG_TABLE")
                .unwrap_or(defaults.change_log_table),
            source_chunk_size: env_parse("ETL_SOURCE_CHUNK_SIZE")?
                .unwrap_or(defaults.source_chunk_size),
        })
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            anyhow::bail!("page size must be at least 1");
        }
        if self.max_concurrent_groups == 0 {
            anyhow::bail!("max concurrent groups must be at least 1");
        }
        if self.source_chunk_size == 0 {
            anyhow::bail!("source chunk size must be at least 1");
        }
        if !crate::sync::registry::is_plain_identifier(&self.change_log_table) {
            anyhow::bail!("invalid change log table name '{}'", self.change_log_table);
        }
        Ok(())
    }
}

impl EtlConfig {
    /// Load the full configuration from the process environment
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            source: DbConfig::from_env("SOURCE").context("Failed to load source database config")?,
            target: DbConfig::from_env("TARGET").context("Failed to load target database config")?,
            engine: EngineConfig::from_env().context("Failed to load engine config")?,
        };
        config.engine.validate()?;
        Ok(config)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: '{}' ({})", name, raw, e)),
        None => Ok(None),
    }
}

/// Builder for EngineConfig
#[derive(Debug)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    /// Set change-log entries per page
    pub fn page_size(mut self, size: u64) -> Self {
        self.config.page_size = size;
        self
    }

    /// Set the number of table groups processed at once
    pub fn max_concurrent_groups(mut self, max: usize) -> Self {
        self.config.max_concurrent_groups = max;
        self
    }

    /// Set the pause between pages
    pub fn page_pause(mut self, pause: Duration) -> Self {
        self.config.page_pause = pause;
        self
    }

    /// Set how many errors/warnings are sampled per page
    pub fn error_sample_size(mut self, size: usize) -> Self {
        self.config.error_sample_size = size;
        self
    }

    /// Set the policy for unregistered tables
    pub fn unknown_tables(mut self, policy: UnknownTablePolicy) -> Self {
        self.config.unknown_tables = policy;
        self
    }

    /// Set the change-log table name
    pub fn change_log_table(mut self, table: impl Into<String>) -> Self {
        self.config.change_log_table = table.into();
        self
    }

    /// Set keys per source `IN (...)` query
    pub fn source_chunk_size(mut self, size: usize) -> Self {
        self.config.source_chunk_size = size;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
