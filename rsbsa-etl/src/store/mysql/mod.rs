//! MySQL-backed stores
//!
//! The source registry and the aggregation hub are both MySQL databases with
//! their own pools. Pools are bounded; callers wait up to the configured
//! acquire timeout for a free connection.

mod changelog;
mod row;
mod source;
mod target;

pub use changelog::MySqlChangeLog;
pub use row::{bind_keys, bind_value, decode_row};
pub use source::MySqlSource;
pub use target::MySqlTarget;

use anyhow::{Context, Result};
use log::info;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};

use crate::config::DbConfig;

/// Open a connection pool for one database
pub async fn connect(config: &DbConfig) -> Result<MySqlPool> {
    let options = MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.database)
        .charset("utf8mb4");

    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await
        .with_context(|| {
            format!(
                "Failed to connect to {}@{}:{}/{}",
                config.user, config.host, config.port, config.database
            )
        })?;

    info!(
        "Connected to {}:{}/{} (pool size {})",
        config.host, config.port, config.database, config.max_connections
    );

    Ok(pool)
}
