use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Failed to read config file '{path}': {cause}")]
    ConfigRead { path: PathBuf, cause: io::Error },

    #[error("Failed to parse config file '{path}': {cause}")]
    ConfigParse {
        path: PathBuf,
        cause: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Failed to read API token file '{path}': {cause}")]
    TokenRead { path: PathBuf, cause: io::Error },

    #[error("Cannot connect to PDM endpoint '{endpoint}': {reason}")]
    Connection { endpoint: String, reason: String },

    #[error("Failed to enumerate {scope}: {reason}")]
    Enumeration { scope: String, reason: String },

    #[error("Failed to retrieve '{file}': {reason}")]
    Retrieve { file: String, reason: String },

    #[error("Cannot prepare backup destination '{path}': {cause}")]
    Destination { path: PathBuf, cause: io::Error },

    #[error("Failed to write '{file}' to '{to}': {cause}")]
    FileCopy {
        file: String,
        to: PathBuf,
        cause: io::Error,
    },

    #[error("Database pool error: {0}")]
    DatabasePool(String),

    #[error("Database query failed for '{operation}': {cause}")]
    DatabaseQuery {
        operation: String,
        cause: rusqlite::Error,
    },

    #[error("Failed to insert into {table}: {cause}")]
    DatabaseInsert {
        table: String,
        cause: rusqlite::Error,
    },

    #[error("Failed to update {table} for job '{id}': {cause}")]
    DatabaseUpdate {
        table: String,
        id: String,
        cause: rusqlite::Error,
    },

    #[error("Invalid cron expression '{expr}': {reason}")]
    Schedule { expr: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, BackupError>;
