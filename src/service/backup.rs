use crate::models::config::Config;
use crate::models::error::BackupError;
use crate::models::file_record::FileRecord;
use crate::models::filter::FileFilter;
use crate::models::job::{CopyStatus, FileResult, JobOutcome, JobReport};
use crate::pdm::client::{BildClient, ConnectionSettings};
use crate::pdm::PdmSource;
use crate::repo::sqlite;
use crate::service::enumerate::enumerate_files;
use crate::utils::progress::{create_copy_bar, create_spinner, format_bytes};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level entry point for one backup job: open a session, enumerate, copy,
/// and always finish with a recorded summary. Fatal errors surface through
/// the report's outcome, never as a panic or early return.
pub fn run_backup_job(
    config: &Config,
    filter: &FileFilter,
    dry_run: bool,
    quiet: bool,
) -> JobReport {
    let ctx = JobContext::begin(config, dry_run);

    let client = match ConnectionSettings::from_config(config)
        .and_then(|settings| BildClient::connect(&settings))
    {
        Ok(client) => client,
        Err(e) => {
            error!("Fatal: {e}");
            return finalize(ctx, Vec::new(), Some(e.to_string()));
        }
    };

    run_with_source(ctx, &client, config, filter, quiet)
}

/// Same pipeline against an already-open PDM session. Split out so tests can
/// drive it with a fake source.
pub fn execute_job(
    source: &dyn PdmSource,
    config: &Config,
    filter: &FileFilter,
    dry_run: bool,
    quiet: bool,
) -> JobReport {
    let ctx = JobContext::begin(config, dry_run);
    run_with_source(ctx, source, config, filter, quiet)
}

struct JobContext {
    id: String,
    started_at: DateTime<Utc>,
    destination: PathBuf,
    dry_run: bool,
}

impl JobContext {
    fn begin(config: &Config, dry_run: bool) -> Self {
        let ctx = Self {
            id: JobReport::new_job_id(),
            started_at: Utc::now(),
            destination: PathBuf::from(&config.destination),
            dry_run,
        };

        if dry_run {
            info!(
                "Backup job {} started in dry-run mode (destination: {})",
                ctx.id,
                ctx.destination.display()
            );
        } else {
            info!(
                "Backup job {} started (destination: {})",
                ctx.id,
                ctx.destination.display()
            );
            if let Err(e) =
                sqlite::insert_job(&ctx.id, ctx.started_at.timestamp(), &config.destination)
            {
                warn!("Failed to record job start: {e}");
            }
        }

        ctx
    }
}

fn run_with_source(
    ctx: JobContext,
    source: &dyn PdmSource,
    config: &Config,
    filter: &FileFilter,
    quiet: bool,
) -> JobReport {
    let spinner = if quiet {
        None
    } else {
        Some(create_spinner("[1/2] Enumerating PDM files..."))
    };

    let records = match enumerate_files(source, filter) {
        Ok(records) => records,
        Err(e) => {
            if let Some(spinner) = &spinner {
                spinner.finish_and_clear();
            }
            error!("Fatal: {e}");
            return finalize(ctx, Vec::new(), Some(e.to_string()));
        }
    };

    if let Some(spinner) = spinner {
        spinner.finish_with_message(format!("[1/2] Found {} files", records.len()));
    }

    if ctx.dry_run {
        for record in &records {
            info!(
                "Would copy {} -> {}",
                record.file_name,
                record.destination_in(&ctx.destination).display()
            );
        }
        info!("Dry run complete: {} files would be considered", records.len());
        return finalize(ctx, Vec::new(), None);
    }

    if let Err(cause) = fs::create_dir_all(&ctx.destination) {
        let e = BackupError::Destination {
            path: ctx.destination.clone(),
            cause,
        };
        error!("Fatal: {e}");
        return finalize(ctx, Vec::new(), Some(e.to_string()));
    }

    let bar = if quiet {
        None
    } else {
        Some(create_copy_bar(records.len() as u64, "[2/2] Copying files"))
    };

    let mut results = Vec::with_capacity(records.len());
    for record in &records {
        let status = copy_file(source, record, &ctx.destination, config.force_overwrite);

        match &status {
            CopyStatus::Copied { bytes } => {
                info!(
                    "Copied {} ({})",
                    record.relative_path.display(),
                    format_bytes(*bytes)
                );
            }
            CopyStatus::Skipped => {
                debug!("Already present, skipping {}", record.relative_path.display());
            }
            CopyStatus::Failed { reason } => {
                warn!("Failed to copy {}: {}", record.relative_path.display(), reason);
            }
        }

        let result = FileResult {
            project: record.project_name.clone(),
            file_name: record.file_name.clone(),
            destination: record.destination_in(&ctx.destination),
            status,
        };

        if let Err(e) = sqlite::insert_file_outcome(&ctx.id, &result) {
            warn!("Failed to record file outcome: {e}");
        }
        if let Some(bar) = &bar {
            bar.inc(1);
        }

        results.push(result);
    }

    if let Some(bar) = bar {
        bar.finish();
    }

    finalize(ctx, results, None)
}

/// One copy attempt. Every failure is folded into the returned status so the
/// loop over the remaining files always continues.
fn copy_file(
    source: &dyn PdmSource,
    record: &FileRecord,
    root: &Path,
    force_overwrite: bool,
) -> CopyStatus {
    let dest = record.destination_in(root);

    if !force_overwrite {
        if let Ok(meta) = fs::metadata(&dest) {
            if meta.is_file() && meta.len() > 0 {
                return CopyStatus::Skipped;
            }
        }
    }

    let released =
        match source.resolve_download(&record.project_id, &record.branch_id, &record.file_id) {
            Ok(released) => released,
            Err(e) => {
                return CopyStatus::Failed {
                    reason: e.to_string(),
                }
            }
        };

    let url = match released.download_url {
        Some(url) => url,
        None => {
            return CopyStatus::Failed {
                reason: "released revision has no download URL".to_string(),
            }
        }
    };

    if let Some(parent) = dest.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            return CopyStatus::Failed {
                reason: format!("cannot create '{}': {e}", parent.display()),
            };
        }
    }

    match source.download(&url, &dest) {
        Ok(bytes) => CopyStatus::Copied { bytes },
        Err(e) => CopyStatus::Failed {
            reason: e.to_string(),
        },
    }
}

/// Single exit path for every job: fixes the end timestamp, writes the Jobs
/// row and the manifest, and emits the summary line. Audit-write failures
/// never change the outcome.
fn finalize(ctx: JobContext, files: Vec<FileResult>, fatal: Option<String>) -> JobReport {
    let dry_run = ctx.dry_run;
    let failed = files.iter().filter(|f| f.status.is_failed()).count();
    let outcome = match fatal {
        Some(reason) => JobOutcome::Failure { reason },
        None => JobOutcome::from_failed_count(failed),
    };

    let report = JobReport {
        id: ctx.id,
        started_at: ctx.started_at,
        finished_at: Utc::now(),
        destination: ctx.destination,
        outcome,
        files,
    };

    match &report.outcome {
        JobOutcome::Failure { .. } => {
            error!("Backup job {} {}", report.id, report.summary_line());
        }
        _ => {
            info!(
                "Backup job {} finished: {} [{} downloaded]",
                report.id,
                report.summary_line(),
                format_bytes(report.total_bytes())
            );
        }
    }

    if !dry_run {
        if let Err(e) = sqlite::finish_job(&report) {
            warn!("Failed to record job finish: {e}");
        }
        if let Err(e) = report.write_manifest() {
            warn!("Failed to write backup report: {e}");
        }
    }

    report
}
