use crate::models::error::{BackupError, Result};
use crate::models::job::{CopyStatus, FileResult, JobReport};
use log::{debug, info};
use once_cell::sync::Lazy;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::sync::{Arc, RwLock};

type DbPool = Pool<SqliteConnectionManager>;

static DB_POOL: Lazy<RwLock<Option<Arc<DbPool>>>> = Lazy::new(|| RwLock::new(None));

pub fn set_db_pool(db_file: &str) -> Result<()> {
    if db_file.is_empty() {
        return Err(BackupError::DatabasePool(
            "Database file path cannot be empty. Provide a valid path or use ':memory:' for an in-memory database.".to_string(),
        ));
    }

    info!("Initializing history database: {}", db_file);

    let is_in_memory = db_file == ":memory:" || db_file.starts_with("file::memory:");
    let use_wal = !is_in_memory;

    let manager = SqliteConnectionManager::file(db_file).with_init(move |conn| {
        let mut pragmas = String::from(
            "PRAGMA busy_timeout = 5000;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA foreign_keys = ON;",
        );

        if use_wal {
            pragmas.push_str(" PRAGMA journal_mode = WAL;");
        }

        conn.execute_batch(&pragmas)
    });

    // The job loop is sequential; the extra connections serve the log writer.
    let pool_size = num_cpus::get_physical() + 3;
    let pool = r2d2::Pool::builder()
        .max_size(pool_size as u32)
        .build(manager)
        .map_err(|e| {
            BackupError::DatabasePool(format!("Failed to create database connection pool: {}", e))
        })?;

    let mut global_pool = DB_POOL.write().unwrap();
    *global_pool = Some(Arc::new(pool));

    Ok(())
}

fn get_connection() -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
    let pool_lock = DB_POOL.read().unwrap();
    let pool = pool_lock.as_ref().ok_or_else(|| {
        BackupError::DatabasePool(
            "Database pool not initialized. Call set_db_pool() first.".to_string(),
        )
    })?;

    pool.get()
        .map_err(|e| BackupError::DatabasePool(format!("Failed to get database connection: {}", e)))
}

pub fn setup_database() -> Result<()> {
    info!("Initializing history database schema");
    let setup_queries = "BEGIN;
    PRAGMA ENCODING = 'UTF-8';

    CREATE TABLE IF NOT EXISTS Jobs(
        ID            TEXT    not null
            constraint Jobs_ID_pk
                primary key,
        Started_At    integer not null,
        Finished_At   integer,
        Destination   TEXT    not null,
        Status        TEXT,
        Files_Copied  integer,
        Files_Skipped integer,
        Files_Failed  integer,
        Error         TEXT,
        constraint Jobs_Status_Check
            check (Status IN ('SUCCESS', 'PARTIAL', 'FAILURE')));

    CREATE INDEX IF NOT EXISTS Jobs_Started_At_index
            on Jobs (Started_At DESC);

    CREATE TABLE IF NOT EXISTS File_Outcomes(
        ID            integer not null
            constraint File_Outcomes_ID_pk
                primary key autoincrement,
        Job_ID        TEXT    not null
            constraint File_Outcomes_Jobs_ID_fk
                references Jobs,
        Project       TEXT    not null,
        File_Name     TEXT    not null,
        Dest_Path     TEXT    not null,
        Status        TEXT    not null,
        Bytes         integer,
        Error         TEXT,
        constraint File_Outcomes_Status_Check
            check (Status IN ('COPIED', 'SKIPPED', 'FAILED')));

    CREATE INDEX IF NOT EXISTS File_Outcomes_Job_ID_index
            on File_Outcomes (Job_ID);

    CREATE TABLE IF NOT EXISTS Logs(
        ID            integer not null
            constraint Logs_ID_pk
                primary key autoincrement,
        Timestamp     integer not null,
        Level         TEXT    not null,
        Message       TEXT    not null,
        Source        TEXT,
        constraint Logs_Level_Check
            check (Level IN ('ERROR', 'WARN', 'INFO', 'DEBUG', 'TRACE')));

    CREATE INDEX IF NOT EXISTS Logs_Timestamp_index
            on Logs (Timestamp DESC);

    COMMIT;";

    let conn = get_connection()?;
    conn.execute_batch(setup_queries)
        .map_err(|cause| BackupError::DatabaseQuery {
            operation: "create tables".to_string(),
            cause,
        })?;
    info!("History database schema initialized");
    Ok(())
}

/// Records a job the moment it starts, before any outcome is known.
pub fn insert_job(job_id: &str, started_at: i64, destination: &str) -> Result<()> {
    let conn = get_connection()?;
    debug!("Recording job start: {}", job_id);

    conn.execute(
        "INSERT INTO Jobs (ID, Started_At, Destination) VALUES (?1, ?2, ?3)",
        (job_id, started_at, destination),
    )
    .map_err(|cause| BackupError::DatabaseInsert {
        table: "Jobs".to_string(),
        cause,
    })?;
    Ok(())
}

/// Writes the job's final state. Called exactly once per job, on every path.
pub fn finish_job(report: &JobReport) -> Result<()> {
    let conn = get_connection()?;

    let error = match &report.outcome {
        crate::models::job::JobOutcome::Failure { reason } => Some(reason.as_str()),
        _ => None,
    };

    conn.execute(
        "UPDATE Jobs SET
             Finished_At = ?1,
             Status = ?2,
             Files_Copied = ?3,
             Files_Skipped = ?4,
             Files_Failed = ?5,
             Error = ?6
         WHERE ID = ?7",
        (
            report.finished_at.timestamp(),
            report.outcome.as_str(),
            report.copied() as i64,
            report.skipped() as i64,
            report.failed() as i64,
            error,
            &report.id,
        ),
    )
    .map_err(|cause| BackupError::DatabaseUpdate {
        table: "Jobs".to_string(),
        id: report.id.clone(),
        cause,
    })?;
    debug!("Recorded job finish: {}", report.id);
    Ok(())
}

pub fn insert_file_outcome(job_id: &str, result: &FileResult) -> Result<()> {
    let conn = get_connection()?;

    let (bytes, error) = match &result.status {
        CopyStatus::Copied { bytes } => (Some(*bytes as i64), None),
        CopyStatus::Skipped => (None, None),
        CopyStatus::Failed { reason } => (None, Some(reason.as_str())),
    };

    conn.execute(
        "INSERT INTO File_Outcomes (Job_ID, Project, File_Name, Dest_Path, Status, Bytes, Error)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        (
            job_id,
            &result.project,
            &result.file_name,
            result.destination.to_string_lossy().into_owned(),
            result.status.as_str(),
            bytes,
            error,
        ),
    )
    .map_err(|cause| BackupError::DatabaseInsert {
        table: "File_Outcomes".to_string(),
        cause,
    })?;
    Ok(())
}

/// Append a log entry to the Logs table.
pub fn insert_log_entry(level: &str, message: &str, source: Option<&str>) -> Result<()> {
    let conn = get_connection()?;
    let timestamp = chrono::Utc::now().timestamp();

    conn.execute(
        "INSERT INTO Logs (Timestamp, Level, Message, Source) VALUES (?1, ?2, ?3, ?4)",
        (timestamp, level, message, source),
    )
    .map_err(|cause| BackupError::DatabaseInsert {
        table: "Logs".to_string(),
        cause,
    })?;

    Ok(())
}

/// Start epoch of the most recent fully successful job, if any. Backs the
/// `--since-last-run` cutoff.
pub fn last_successful_job_start() -> Result<Option<i64>> {
    let conn = get_connection()?;

    let mut stmt = conn
        .prepare(
            "SELECT Started_At FROM Jobs
             WHERE Status = 'SUCCESS'
             ORDER BY Started_At DESC
             LIMIT 1",
        )
        .map_err(|cause| BackupError::DatabaseQuery {
            operation: "last successful job".to_string(),
            cause,
        })?;

    use rusqlite::OptionalExtension;
    stmt.query_row([], |row| row.get(0))
        .optional()
        .map_err(|cause| BackupError::DatabaseQuery {
            operation: "last successful job".to_string(),
            cause,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::{JobOutcome, JobReport};
    use chrono::{TimeZone, Utc};
    use serial_test::serial;
    use std::path::PathBuf;

    // Shared in-memory database: plain ":memory:" would give every pooled
    // connection its own database.
    fn setup_test_db() {
        set_db_pool("file::memory:?cache=shared").unwrap();
        setup_database().unwrap();
        let conn = get_connection().unwrap();
        conn.execute("DELETE FROM File_Outcomes", []).unwrap();
        conn.execute("DELETE FROM Logs", []).unwrap();
        conn.execute("DELETE FROM Jobs", []).unwrap();
    }

    fn sample_report(id: &str, started_epoch: i64, outcome: JobOutcome) -> JobReport {
        JobReport {
            id: id.to_string(),
            started_at: Utc.timestamp_opt(started_epoch, 0).unwrap(),
            finished_at: Utc.timestamp_opt(started_epoch + 5, 0).unwrap(),
            destination: PathBuf::from("/backups"),
            outcome,
            files: vec![],
        }
    }

    #[test]
    #[serial]
    fn test_setup_database_creates_schema() {
        setup_test_db();

        let conn = get_connection().unwrap();
        assert!(conn.execute("SELECT 1 FROM Jobs WHERE 1=0", []).is_ok());
        assert!(conn
            .execute("SELECT 1 FROM File_Outcomes WHERE 1=0", [])
            .is_ok());
        assert!(conn.execute("SELECT 1 FROM Logs WHERE 1=0", []).is_ok());
    }

    #[test]
    #[serial]
    fn test_insert_and_finish_job() {
        setup_test_db();

        insert_job("job-1", 1000, "/backups").unwrap();

        let report = sample_report("job-1", 1000, JobOutcome::Partial { failed: 1 });
        finish_job(&report).unwrap();

        let conn = get_connection().unwrap();
        let (status, finished): (String, i64) = conn
            .query_row(
                "SELECT Status, Finished_At FROM Jobs WHERE ID = 'job-1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(status, "PARTIAL");
        assert_eq!(finished, 1005);
    }

    #[test]
    #[serial]
    fn test_finish_job_records_failure_reason() {
        setup_test_db();

        insert_job("job-2", 2000, "/backups").unwrap();
        let report = sample_report(
            "job-2",
            2000,
            JobOutcome::Failure {
                reason: "endpoint unreachable".to_string(),
            },
        );
        finish_job(&report).unwrap();

        let conn = get_connection().unwrap();
        let error: String = conn
            .query_row("SELECT Error FROM Jobs WHERE ID = 'job-2'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(error, "endpoint unreachable");
    }

    #[test]
    #[serial]
    fn test_insert_file_outcomes() {
        setup_test_db();

        insert_job("job-3", 3000, "/backups").unwrap();

        let copied = FileResult {
            project: "Widgets".to_string(),
            file_name: "a.step".to_string(),
            destination: PathBuf::from("/backups/Widgets/a.step"),
            status: CopyStatus::Copied { bytes: 42 },
        };
        let failed = FileResult {
            project: "Widgets".to_string(),
            file_name: "b.step".to_string(),
            destination: PathBuf::from("/backups/Widgets/b.step"),
            status: CopyStatus::Failed {
                reason: "read error".to_string(),
            },
        };

        insert_file_outcome("job-3", &copied).unwrap();
        insert_file_outcome("job-3", &failed).unwrap();

        let conn = get_connection().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM File_Outcomes WHERE Job_ID = 'job-3'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);

        let (bytes, error): (Option<i64>, Option<String>) = conn
            .query_row(
                "SELECT Bytes, Error FROM File_Outcomes WHERE File_Name = 'b.step'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert!(bytes.is_none());
        assert_eq!(error.as_deref(), Some("read error"));
    }

    #[test]
    #[serial]
    fn test_insert_log_entry() {
        setup_test_db();

        insert_log_entry("INFO", "job started", Some("service::backup")).unwrap();

        let conn = get_connection().unwrap();
        let (level, message): (String, String) = conn
            .query_row("SELECT Level, Message FROM Logs", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(level, "INFO");
        assert_eq!(message, "job started");
    }

    #[test]
    #[serial]
    fn test_last_successful_job_start() {
        setup_test_db();

        assert!(last_successful_job_start().unwrap().is_none());

        insert_job("old", 1000, "/backups").unwrap();
        finish_job(&sample_report("old", 1000, JobOutcome::Success)).unwrap();

        insert_job("failed", 2000, "/backups").unwrap();
        finish_job(&sample_report(
            "failed",
            2000,
            JobOutcome::Failure {
                reason: "x".to_string(),
            },
        ))
        .unwrap();

        insert_job("new", 1500, "/backups").unwrap();
        finish_job(&sample_report("new", 1500, JobOutcome::Success)).unwrap();

        // The failed run at 2000 must not win; latest SUCCESS is 1500.
        assert_eq!(last_successful_job_start().unwrap(), Some(1500));
    }
}
