//! Command-line control layer

pub mod handler;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::EngineConfig;
use crate::sync::registry::UnknownTablePolicy;

pub use handler::handle_command;

#[derive(Parser)]
#[command(name = "rsbsa-etl")]
#[command(version, about = "Synchronize RSBSA registry tables into the aggregation hub", long_about = None)]
pub struct Cli {
    /// Debug logging for the sync engine
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process every pending change-log entry once
    Run(RunArgs),
    /// Run on a fixed interval; triggers that arrive mid-run are skipped
    Schedule(ScheduleArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ScheduleArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Seconds between triggers
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_secs: u64,

    /// Print each run summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Named engine tunings
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preset {
    /// Small pages, one group at a time, longer pauses
    Conservative,
    /// No parallelism and no pause between pages
    Sequential,
}

/// Engine overrides; unset flags keep the environment's values
#[derive(Args, Debug, Default)]
pub struct EngineArgs {
    /// Start from a named tuning; explicit flags still win
    #[arg(long, value_enum)]
    pub preset: Option<Preset>,

    /// Change-log entries per page
    #[arg(long)]
    pub page_size: Option<u64>,

    /// Table groups processed concurrently
    #[arg(long)]
    pub max_concurrent_groups: Option<usize>,

    /// Pause between pages in milliseconds
    #[arg(long)]
    pub page_pause_ms: Option<u64>,

    /// Warnings and errors logged per page
    #[arg(long)]
    pub error_sample_size: Option<usize>,

    /// What to do with tables outside the registry (skip or passthrough)
    #[arg(long)]
    pub unknown_tables: Option<UnknownTablePolicy>,
}

impl EngineArgs {
    pub fn apply(&self, config: &mut EngineConfig) {
        match self.preset {
            Some(Preset::Conservative) => {
                let preset = EngineConfig::conservative();
                config.page_size = preset.page_size;
                config.max_concurrent_groups = preset.max_concurrent_groups;
                config.page_pause = preset.page_pause;
            }
            Some(Preset::Sequential) => {
                let preset = EngineConfig::sequential();
                config.max_concurrent_groups = preset.max_concurrent_groups;
                config.page_pause = preset.page_pause;
            }
            None => {}
        }
        if let Some(size) = self.page_size {
            config.page_size = size;
        }
        if let Some(max) = self.max_concurrent_groups {
            config.max_concurrent_groups = max;
        }
        if let Some(ms) = self.page_pause_ms {
            config.page_pause = std::time::Duration::from_millis(ms);
        }
        if let Some(size) = self.error_sample_size {
            config.error_sample_size = size;
        }
        if let Some(policy) = self.unknown_tables {
            config.unknown_tables = policy;
        }
    }
}
