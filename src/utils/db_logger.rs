use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::mpsc::{self, Sender};
use std::thread;

/// Message sent from logger to the background writer.
struct LogMessage {
    level: String,
    message: String,
    source: Option<String>,
}

/// Logger for real backup runs: every line is echoed to stderr and forwarded
/// to a worker thread that appends it to the Logs table. Lines logged before
/// the database pool exists simply stay stderr-only.
pub struct DatabaseLogger {
    level: LevelFilter,
    tx: Sender<LogMessage>,
}

impl DatabaseLogger {
    fn new(level: LevelFilter) -> Self {
        let (tx, rx) = mpsc::channel::<LogMessage>();

        thread::spawn(move || {
            log_writer_worker(rx);
        });

        DatabaseLogger { level, tx }
    }
}

impl Log for DatabaseLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let level = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };

        eprintln!(
            "[{}] {}: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            level,
            record.args()
        );

        let message = LogMessage {
            level: level.to_string(),
            message: format!("{}", record.args()),
            source: record.module_path().map(|s| s.to_string()),
        };

        // Ignore a disconnected channel; logging must never fail the job.
        let _ = self.tx.send(message);
    }

    fn flush(&self) {}
}

fn log_writer_worker(rx: mpsc::Receiver<LogMessage>) {
    while let Ok(log_msg) = rx.recv() {
        // Errors here would recurse into logging, so they are dropped.
        let _ = crate::repo::sqlite::insert_log_entry(
            &log_msg.level,
            &log_msg.message,
            log_msg.source.as_deref(),
        );
    }
}

/// Install the database logger as the global logger.
pub fn init(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    let logger = DatabaseLogger::new(level);
    log::set_max_level(level);
    log::set_boxed_logger(Box::new(logger))
}
