//! Command handlers: wire config, pools and the engine together

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::*;
use log::{error, info, warn};

use super::{Cli, Commands, EngineArgs, RunArgs, ScheduleArgs};
use crate::config::EtlConfig;
use crate::logging::manila_timestamp;
use crate::store::mysql::{self, MySqlChangeLog, MySqlSource, MySqlTarget};
use crate::sync::{RunSummary, SyncEngine};

pub async fn handle_command(cli: Cli) -> Result<()> {
    if cli.no_color {
        colored::control::set_override(false);
    }

    match cli.command {
        Commands::Run(args) => handle_run(args).await,
        Commands::Schedule(args) => handle_schedule(args).await,
    }
}

/// Load config from the environment, apply CLI overrides and connect both pools
async fn build_engine(overrides: &EngineArgs) -> Result<SyncEngine> {
    let mut config = EtlConfig::from_env()?;
    overrides.apply(&mut config.engine);
    config.engine.validate().context("Invalid engine options")?;

    let source_pool = mysql::connect(&config.source)
        .await
        .context("Source database unavailable")?;
    let target_pool = mysql::connect(&config.target)
        .await
        .context("Target database unavailable")?;

    let engine = config.engine;
    Ok(SyncEngine::new(
        Arc::new(MySqlChangeLog::new(source_pool.clone(), engine.change_log_table.clone())),
        Arc::new(MySqlSource::new(source_pool, engine.source_chunk_size)),
        Arc::new(MySqlTarget::new(target_pool)),
        engine,
    ))
}

async fn handle_run(args: RunArgs) -> Result<()> {
    let engine = build_engine(&args.engine).await?;
    let summary = engine.run_once().await.context("Sync run failed")?;
    print_summary(&summary, args.json)
}

async fn handle_schedule(args: ScheduleArgs) -> Result<()> {
    let engine = Arc::new(build_engine(&args.engine).await?);
    let guard = RunGuard::new();
    let json = args.json;

    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    println!(
        "{} every {}s (Ctrl+C to stop)",
        "Scheduling sync".green().bold(),
        args.interval_secs
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(run) = guard.try_start() else {
                    warn!("Previous run still in progress; skipping this trigger");
                    continue;
                };
                let engine = engine.clone();
                tokio::spawn(async move {
                    let _run = run;
                    match engine.run_once().await {
                        Ok(summary) => {
                            if let Err(e) = print_summary(&summary, json) {
                                error!("Failed to print run summary: {:#}", e);
                            }
                        }
                        Err(e) => error!("Sync run failed: {:#}", e),
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping scheduler");
                break;
            }
        }
    }

    if guard.is_running() {
        println!("{}", "Waiting for the current run to finish...".yellow());
        while guard.is_running() {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    Ok(())
}

/// Process-wide "run in progress" flag
#[derive(Clone, Default)]
pub struct RunGuard {
    running: Arc<AtomicBool>,
}

/// Clears the flag when dropped
pub struct RunPermit {
    running: Arc<AtomicBool>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a run as started, or `None` if one already is
    pub fn try_start(&self) -> Option<RunPermit> {
        if self.running.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(RunPermit {
            running: self.running.clone(),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(summary).context("Failed to serialize run summary")?
        );
        return Ok(());
    }

    if summary.is_idle() {
        println!("{} {}", "No pending changes".dimmed(), summary.run_id.to_string().dimmed());
        return Ok(());
    }

    let status = if summary.failed == 0 {
        "Sync complete".green().bold()
    } else {
        "Sync complete with failures".yellow().bold()
    };
    println!("{} ({})", status, summary.run_id.to_string().dimmed());
    println!("  Processed: {}", summary.processed.to_string().green());
    println!("  Skipped:   {}", summary.skipped.to_string().yellow());
    println!("  Failed:    {}", summary.failed.to_string().red());
    println!("  Started:   {}", manila_timestamp(summary.start_time));
    println!("  Finished:  {}", manila_timestamp(summary.end_time));
    println!("  Duration:  {}ms", summary.duration().num_milliseconds());

    for err in &summary.errors {
        println!(
            "  {} {} [{}]: {}",
            "x".red(),
            err.table.cyan(),
            err.entity_key,
            err.message
        );
    }

    Ok(())
}
