//! Log setup for the binary
//!
//! Every line is stamped with Philippine time so logs line up with the
//! registry's own timestamps.

use std::io::Write;

use chrono::{DateTime, Utc};
use chrono_tz::Asia::Manila;
use env_logger::Env;

/// Format a UTC instant as Manila local time with millisecond precision
pub fn manila_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Manila)
        .format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        .to_string()
}

/// Install the global logger; level comes from `RUST_LOG` (default `info`)
///
/// `verbose` raises this crate's level to debug.
pub fn init(verbose: bool) {
    let default = if verbose { "info,rsbsa_etl=debug" } else { "info" };

    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(default))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {:<5} {}: {}",
                manila_timestamp(Utc::now()),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init();
}
