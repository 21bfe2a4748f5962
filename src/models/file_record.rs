use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// One file eligible for backup, as produced by enumeration.
///
/// `relative_path` is already sanitized and rooted at the project directory,
/// so the destination is fully determined by the record plus the job's
/// destination root.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub project_id: String,
    pub project_name: String,
    pub branch_id: String,
    pub file_id: String,
    pub file_name: String,
    pub relative_path: PathBuf,
    pub last_modified: Option<DateTime<Utc>>,
}

impl FileRecord {
    pub fn destination_in(&self, root: &Path) -> PathBuf {
        root.join(&self.relative_path)
    }
}
