use crate::models::error::Result;
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

/// Fixed manifest name: each run overwrites the previous report so a repeat
/// run against unchanged source state leaves the destination tree identical.
pub const REPORT_FILE_NAME: &str = "backup-report.json";

/// Overall result of one backup job.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    /// Every enumerated file copied or was already present.
    Success,
    /// The job ran to completion but some files failed.
    Partial { failed: usize },
    /// Connection, enumeration, or the destination root failed outright.
    Failure { reason: String },
}

impl JobOutcome {
    /// Label stored in the Jobs table.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Success => "SUCCESS",
            JobOutcome::Partial { .. } => "PARTIAL",
            JobOutcome::Failure { .. } => "FAILURE",
        }
    }

    /// Process exit code: 0 full success, 2 partial, 1 failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            JobOutcome::Success => 0,
            JobOutcome::Partial { .. } => 2,
            JobOutcome::Failure { .. } => 1,
        }
    }

    /// Aggregate outcome for a job that ran its copy loop to the end.
    pub fn from_failed_count(failed: usize) -> Self {
        if failed == 0 {
            JobOutcome::Success
        } else {
            JobOutcome::Partial { failed }
        }
    }
}

/// Result of one copy attempt.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CopyStatus {
    Copied { bytes: u64 },
    Skipped,
    Failed { reason: String },
}

impl CopyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyStatus::Copied { .. } => "COPIED",
            CopyStatus::Skipped => "SKIPPED",
            CopyStatus::Failed { .. } => "FAILED",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CopyStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub project: String,
    pub file_name: String,
    pub destination: PathBuf,
    #[serde(flatten)]
    pub status: CopyStatus,
}

/// One end-to-end backup run, summarized for the audit trail and manifest.
#[derive(Debug, Serialize)]
pub struct JobReport {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub destination: PathBuf,
    #[serde(flatten)]
    pub outcome: JobOutcome,
    pub files: Vec<FileResult>,
}

impl JobReport {
    pub fn new_job_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn copied(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, CopyStatus::Copied { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, CopyStatus::Skipped))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.files.iter().filter(|f| f.status.is_failed()).count()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files
            .iter()
            .map(|f| match f.status {
                CopyStatus::Copied { bytes } => bytes,
                _ => 0,
            })
            .sum()
    }

    /// One-line job summary, e.g. "3/3 succeeded (2 copied, 1 skipped)".
    pub fn summary_line(&self) -> String {
        match &self.outcome {
            JobOutcome::Failure { reason } => format!("failed: {}", reason),
            _ => {
                let total = self.files.len();
                let succeeded = total - self.failed();
                format!(
                    "{}/{} succeeded ({} copied, {} skipped, {} failed)",
                    succeeded,
                    total,
                    self.copied(),
                    self.skipped(),
                    self.failed()
                )
            }
        }
    }

    /// Writes the JSON manifest into the destination root.
    pub fn write_manifest(&self) -> Result<PathBuf> {
        let path = self.destination.join(REPORT_FILE_NAME);
        let body = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(&path, body)?;
        info!("Backup report saved to: {}", path.display());
        Ok(path)
    }
}
