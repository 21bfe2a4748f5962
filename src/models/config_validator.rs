use crate::models::config::Config;
use crate::models::error::{BackupError, Result};
use log::{info, warn};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Validates the entire configuration before any job runs.
pub fn validate_config(config: &Config) -> Result<()> {
    info!("Validating configuration...");

    validate_endpoint(&config.api_base_url)?;
    validate_token_file(&config.api_token_file)?;
    validate_destination(&config.destination)?;
    validate_database_path(&config.database_file)?;
    validate_schedule(config)?;
    validate_timeouts(config)?;

    info!("Configuration validation passed");
    Ok(())
}

fn validate_endpoint(base_url: &str) -> Result<()> {
    if base_url.trim().is_empty() {
        return Err(BackupError::ConfigInvalid(
            "api_base_url must not be empty".to_string(),
        ));
    }

    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(BackupError::ConfigInvalid(format!(
            "api_base_url must start with http:// or https://, got: {}",
            base_url
        )));
    }

    Ok(())
}

fn validate_token_file(token_file: &str) -> Result<()> {
    if token_file.trim().is_empty() {
        return Err(BackupError::ConfigInvalid(
            "api_token_file must not be empty. The file should contain only the Bild API Bearer token.".to_string(),
        ));
    }

    let path = Path::new(token_file);
    if !path.exists() {
        return Err(BackupError::ConfigInvalid(format!(
            "API token file does not exist: {}",
            token_file
        )));
    }
    if !path.is_file() {
        return Err(BackupError::ConfigInvalid(format!(
            "API token path is not a file: {}",
            token_file
        )));
    }

    Ok(())
}

fn validate_destination(destination: &str) -> Result<()> {
    if destination.trim().is_empty() {
        return Err(BackupError::ConfigInvalid(
            "destination must not be empty".to_string(),
        ));
    }

    let path = Path::new(destination);

    if !path.exists() {
        // The executor creates the destination root, but its parent must exist.
        if let Some(parent) = path.parent() {
            let parent_exists = parent.as_os_str().is_empty() || parent.exists();
            if !parent_exists {
                #[cfg(windows)]
                let suggestion = format!("mkdir \"{}\"", parent.display());
                #[cfg(not(windows))]
                let suggestion = format!("mkdir -p \"{}\"", parent.display());

                return Err(BackupError::ConfigInvalid(format!(
                    "Destination parent directory does not exist: {}\nSuggestion: Create it with: {}",
                    destination, suggestion
                )));
            }

            if !parent.as_os_str().is_empty() {
                if let Err(e) = check_writable(parent) {
                    return Err(BackupError::ConfigInvalid(format!(
                        "Destination parent directory is not writable: {}\nError: {}",
                        destination, e
                    )));
                }
            }

            warn!(
                "Destination does not exist but will be created: {}",
                destination
            );
        } else {
            return Err(BackupError::ConfigInvalid(format!(
                "Destination has no parent directory: {}",
                destination
            )));
        }
    } else {
        if !path.is_dir() {
            return Err(BackupError::ConfigInvalid(format!(
                "Destination exists but is not a directory: {}",
                destination
            )));
        }

        if let Err(e) = check_writable(path) {
            return Err(BackupError::ConfigInvalid(format!(
                "Destination is not writable: {}\nError: {}",
                destination, e
            )));
        }
    }

    Ok(())
}

fn validate_database_path(db_file: &str) -> Result<()> {
    if db_file.is_empty() || db_file == ":memory:" || db_file.starts_with("file::memory:") {
        info!("Using in-memory history database");
        return Ok(());
    }

    let path = Path::new(db_file);

    if path.exists() {
        if !path.is_file() {
            return Err(BackupError::ConfigInvalid(format!(
                "Database path exists but is not a file: {}",
                db_file
            )));
        }

        if let Err(e) = fs::OpenOptions::new().read(true).write(true).open(path) {
            return Err(BackupError::ConfigInvalid(format!(
                "Database file is not readable/writable: {}\nError: {}",
                db_file, e
            )));
        }
    } else if let Some(parent) = path.parent() {
        let parent_exists = parent.as_os_str().is_empty() || parent.exists();

        if !parent_exists {
            #[cfg(windows)]
            let suggestion = format!("mkdir \"{}\"", parent.display());
            #[cfg(not(windows))]
            let suggestion = format!("mkdir -p \"{}\"", parent.display());

            return Err(BackupError::ConfigInvalid(format!(
                "Database parent directory does not exist: {}\nSuggestion: Create it with: {}",
                db_file, suggestion
            )));
        }

        if !parent.as_os_str().is_empty() {
            if let Err(e) = check_writable(parent) {
                return Err(BackupError::ConfigInvalid(format!(
                    "Database parent directory is not writable: {}\nError: {}",
                    db_file, e
                )));
            }
        }
    } else {
        return Err(BackupError::ConfigInvalid(format!(
            "Database path has no parent directory: {}",
            db_file
        )));
    }

    Ok(())
}

fn validate_schedule(config: &Config) -> Result<()> {
    if let Some(schedule_str) = &config.schedule {
        match cron::Schedule::from_str(schedule_str) {
            Ok(_) => {
                info!("Schedule validated: {}", schedule_str);
            }
            Err(e) => {
                return Err(BackupError::Schedule {
                    expr: schedule_str.clone(),
                    reason: format!("{}\nExample: '0 0 2 * * *' for daily at 2am", e),
                });
            }
        }
    }
    Ok(())
}

fn validate_timeouts(config: &Config) -> Result<()> {
    if config.request_timeout_secs == 0 {
        return Err(BackupError::ConfigInvalid(
            "request_timeout_secs must be greater than 0".to_string(),
        ));
    }
    if config.download_timeout_secs == 0 {
        return Err(BackupError::ConfigInvalid(
            "download_timeout_secs must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

/// Check if a directory is writable by attempting to create a temporary file.
fn check_writable(path: &Path) -> std::io::Result<()> {
    let test_file = path.join(".bild_backup_write_test");
    fs::write(&test_file, b"test")?;
    fs::remove_file(&test_file)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(temp: &TempDir) -> Config {
        let token_path = temp.path().join("token.txt");
        fs::write(&token_path, "secret").unwrap();
        let dest = temp.path().join("backups");
        fs::create_dir_all(&dest).unwrap();

        Config {
            api_base_url: "https://sandbox-api.getbild.com".to_string(),
            api_token_file: token_path.to_str().unwrap().to_string(),
            destination: dest.to_str().unwrap().to_string(),
            database_file: ":memory:".to_string(),
            schedule: None,
            run_on_startup: true,
            force_overwrite: false,
            request_timeout_secs: 30,
            download_timeout_secs: 300,
        }
    }

    #[test]
    fn test_check_writable_temp_dir() {
        let temp_dir = std::env::temp_dir();
        assert!(check_writable(&temp_dir).is_ok());
    }

    #[test]
    fn test_validate_config_passes_for_valid_config() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp);

        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_rejects_endpoint_without_scheme() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp);
        config.api_base_url = "sandbox-api.getbild.com".to_string();

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("http"));
    }

    #[test]
    fn test_rejects_empty_endpoint() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp);
        config.api_base_url = String::new();

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("api_base_url"));
    }

    #[test]
    fn test_rejects_missing_token_file() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp);
        config.api_token_file = temp
            .path()
            .join("missing.txt")
            .to_str()
            .unwrap()
            .to_string();

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_accepts_missing_destination_with_existing_parent() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp);
        config.destination = temp
            .path()
            .join("not_yet_created")
            .to_str()
            .unwrap()
            .to_string();

        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_rejects_destination_under_missing_parent() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp);
        config.destination = temp
            .path()
            .join("missing_parent")
            .join("backups")
            .to_str()
            .unwrap()
            .to_string();

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("parent directory does not exist"));
    }

    #[test]
    fn test_accepts_valid_cron_schedule() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp);
        config.schedule = Some("0 0 2 * * *".to_string());

        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_rejects_invalid_cron_schedule() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp);
        config.schedule = Some("invalid cron".to_string());

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Invalid cron expression"));
    }

    #[test]
    fn test_accepts_various_valid_cron_expressions() {
        let temp = TempDir::new().unwrap();

        let valid_expressions = vec![
            "0 0 2 * * *",      // Daily at 2am
            "0 */30 * * * *",   // Every 30 minutes
            "0 0 */6 * * *",    // Every 6 hours
            "0 0 0 * * 1",      // Every Monday at midnight
            "0 0 9,17 * * 1-5", // Weekdays at 9am and 5pm
        ];

        for expr in valid_expressions {
            let mut config = test_config(&temp);
            config.schedule = Some(expr.to_string());
            // Fresh dirs per iteration not needed, validation is read-only.
            let result = validate_config(&config);
            assert!(
                result.is_ok(),
                "Expected cron expression '{}' to be valid, but got error: {:?}",
                expr,
                result
            );
        }
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp);
        config.request_timeout_secs = 0;

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("request_timeout_secs"));
    }

    #[test]
    fn test_accepts_in_memory_database() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp);
        config.database_file = "file::memory:?cache=shared".to_string();

        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_rejects_database_under_missing_parent() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp);
        config.database_file = temp
            .path()
            .join("missing_parent")
            .join("history.db")
            .to_str()
            .unwrap()
            .to_string();

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("parent directory does not exist"));
    }
}
