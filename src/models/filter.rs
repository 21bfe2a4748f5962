use crate::models::file_record::FileRecord;
use chrono::{DateTime, Utc};

/// Selects which enumerated files a job backs up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFilter {
    /// Every file the account can reach.
    All,
    /// Only files modified after the cutoff. Files the API reports no
    /// modification time for are included rather than silently dropped.
    ChangedSince(DateTime<Utc>),
}

impl FileFilter {
    pub fn matches(&self, record: &FileRecord) -> bool {
        match self {
            FileFilter::All => true,
            FileFilter::ChangedSince(cutoff) => match record.last_modified {
                Some(modified) => modified > *cutoff,
                None => true,
            },
        }
    }

    pub fn describe(&self) -> String {
        match self {
            FileFilter::All => "all files".to_string(),
            FileFilter::ChangedSince(cutoff) => {
                format!("files changed since {}", cutoff.to_rfc3339())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn record_modified_at(ts: Option<DateTime<Utc>>) -> FileRecord {
        FileRecord {
            project_id: "p1".to_string(),
            project_name: "Widgets".to_string(),
            branch_id: "b1".to_string(),
            file_id: "f1".to_string(),
            file_name: "a.step".to_string(),
            relative_path: PathBuf::from("Widgets/a.step"),
            last_modified: ts,
        }
    }

    #[test]
    fn test_all_matches_everything() {
        assert!(FileFilter::All.matches(&record_modified_at(None)));
        assert!(FileFilter::All.matches(&record_modified_at(Some(Utc::now()))));
    }

    #[test]
    fn test_changed_since_keeps_newer() {
        let cutoff = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let older = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();

        let filter = FileFilter::ChangedSince(cutoff);
        assert!(filter.matches(&record_modified_at(Some(newer))));
        assert!(!filter.matches(&record_modified_at(Some(older))));
        assert!(!filter.matches(&record_modified_at(Some(cutoff))));
    }

    #[test]
    fn test_changed_since_keeps_unknown_mtime() {
        let cutoff = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert!(FileFilter::ChangedSince(cutoff).matches(&record_modified_at(None)));
    }
}
