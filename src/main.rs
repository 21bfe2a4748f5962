mod models;
mod pdm;
mod repo;
mod service;
mod utils;

use crate::models::config::{setup_config, Config};
use crate::models::filter::FileFilter;
use crate::models::job::JobOutcome;
use crate::service::backup::run_backup_job;
use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "run-backup")]
#[command(about = "Backs up a Bild PDM account to local storage", long_about = None)]
struct Cli {
    #[arg(
        short = 'c',
        long = "config",
        default_value = "config.json",
        env = "BILD_BACKUP_CONFIG"
    )]
    config_file: String,

    #[arg(
        short = 'l',
        long = "log-level",
        default_value = "info",
        env = "LOG_LEVEL"
    )]
    log_level: String,

    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    #[arg(short = 'v', long = "validate-only")]
    validate_only: bool,

    #[arg(short = 'd', long = "dry-run")]
    dry_run: bool,

    #[arg(short = 'o', long = "once")]
    once: bool,

    /// Only back up files changed after this RFC3339 timestamp.
    #[arg(long = "since", conflicts_with = "since_last_run")]
    since: Option<String>,

    /// Only back up files changed after the last successful run.
    #[arg(long = "since-last-run")]
    since_last_run: bool,
}

fn main() -> ExitCode {
    let args = Cli::parse();
    match cli_main(args) {
        Ok(code) => code,
        Err(e) => {
            // The logger may not be installed yet; write straight to stderr.
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn cli_main(args: Cli) -> Result<ExitCode> {
    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };

    // Validation and dry runs leave no trace in the history database, so
    // they log to stderr only.
    if args.validate_only || args.dry_run {
        env_logger::Builder::from_default_env()
            .filter_level(log_level)
            .format_timestamp_secs()
            .init();
    } else {
        utils::db_logger::init(log_level).context("Failed to install logger")?;
    }

    info!("bild-backup starting...");
    let config: Config = setup_config(args.config_file.clone()).context("Failed to load configuration")?;

    if args.validate_only {
        info!("Configuration is valid. Exiting (--validate-only mode).");
        return Ok(ExitCode::SUCCESS);
    }

    repo::sqlite::set_db_pool(&config.database_file)
        .context("Failed to initialize history database")?;
    repo::sqlite::setup_database().context("Failed to set up history database schema")?;

    let filter = resolve_filter(&args)?;
    info!("Backing up {}", filter.describe());

    let run_once = args.once || config.schedule.is_none();

    if run_once {
        let report = run_backup_job(&config, &filter, args.dry_run, args.quiet);
        Ok(ExitCode::from(report.outcome.exit_code()))
    } else {
        run_scheduled(&config, &filter, args.dry_run, args.quiet)?;
        Ok(ExitCode::SUCCESS)
    }
}

fn resolve_filter(args: &Cli) -> Result<FileFilter> {
    if let Some(since) = &args.since {
        let cutoff = chrono::DateTime::parse_from_rfc3339(since)
            .with_context(|| format!("Invalid --since timestamp '{since}', expected RFC3339"))?;
        return Ok(FileFilter::ChangedSince(cutoff.with_timezone(&chrono::Utc)));
    }

    if args.since_last_run {
        return match repo::sqlite::last_successful_job_start()? {
            Some(epoch) => {
                let cutoff = chrono::DateTime::from_timestamp(epoch, 0)
                    .context("Stored job timestamp out of range")?;
                Ok(FileFilter::ChangedSince(cutoff))
            }
            None => {
                warn!("No successful backup on record; backing up all files");
                Ok(FileFilter::All)
            }
        };
    }

    Ok(FileFilter::All)
}

fn run_scheduled(config: &Config, filter: &FileFilter, dry_run: bool, quiet: bool) -> Result<()> {
    use chrono::Utc;
    use cron::Schedule;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    let schedule_str = config.schedule.as_ref().unwrap();
    let schedule = Schedule::from_str(schedule_str).context("Invalid cron expression")?;

    info!(
        "Starting scheduled backup mode with schedule: {}",
        schedule_str
    );

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    if config.run_on_startup {
        info!("Running initial backup on startup...");
        let report = run_backup_job(config, filter, dry_run, quiet);
        if let JobOutcome::Failure { reason } = &report.outcome {
            warn!("Initial backup failed: {}", reason);
        }
    }

    while running.load(Ordering::SeqCst) {
        let Some(next) = schedule.upcoming(Utc).next() else {
            warn!("No upcoming scheduled times found");
            break;
        };

        let wait_secs = (next - Utc::now()).num_seconds().max(0);
        info!(
            "Next backup scheduled for: {} (in {} seconds)",
            next.format("%Y-%m-%d %H:%M:%S %Z"),
            wait_secs
        );

        // Sleep in short ticks so Ctrl+C is honored between jobs. Fires that
        // land while a job is still running are skipped, never stacked.
        while running.load(Ordering::SeqCst) && Utc::now() < next {
            std::thread::sleep(std::time::Duration::from_secs(1));
        }

        if running.load(Ordering::SeqCst) {
            info!("Running scheduled backup...");
            let report = run_backup_job(config, filter, dry_run, quiet);
            if let JobOutcome::Failure { reason } = &report.outcome {
                warn!("Scheduled backup failed: {}", reason);
            }
        }
    }

    info!("Scheduler stopped");
    Ok(())
}
