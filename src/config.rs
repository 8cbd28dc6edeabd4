// ABOUTME: Configuration loading for the hireledger binary.
// ABOUTME: Reads HIRELEDGER_* environment variables (optionally from .env) and validates them.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("HIRELEDGER_BATCH_SIZE must be a positive integer, got '{0}'")]
    InvalidBatchSize(String),

    #[error("HIRELEDGER_ROW_GROUP_SIZE must be a positive integer, got '{0}'")]
    InvalidRowGroupSize(String),
}

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct HireledgerConfig {
    pub database: PathBuf,
    pub backup_dir: PathBuf,
    pub batch_size: NonZeroUsize,
    pub csv_header: bool,
    pub row_group_size: NonZeroUsize,
}

impl HireledgerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// Environment variables:
    /// - HIRELEDGER_DATABASE: SQLite database path (default: hireledger.db)
    /// - HIRELEDGER_BACKUP_DIR: container directory (default: backups)
    /// - HIRELEDGER_BATCH_SIZE: records per ingestion transaction (default: 1000)
    /// - HIRELEDGER_CSV_HEADER: CSV inputs start with a header row (default: false)
    /// - HIRELEDGER_ROW_GROUP_SIZE: rows per container row group (default: 10000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database = std::env::var("HIRELEDGER_DATABASE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("hireledger.db"));

        let backup_dir = std::env::var("HIRELEDGER_BACKUP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("backups"));

        let batch_size = positive("HIRELEDGER_BATCH_SIZE", 1000)
            .map_err(ConfigError::InvalidBatchSize)?;

        let csv_header = std::env::var("HIRELEDGER_CSV_HEADER")
            .map(|v| v == "true" || v == "1" || v == "yes")
            .unwrap_or(false);

        let row_group_size = positive("HIRELEDGER_ROW_GROUP_SIZE", 10_000)
            .map_err(ConfigError::InvalidRowGroupSize)?;

        Ok(Self {
            database,
            backup_dir,
            batch_size,
            csv_header,
            row_group_size,
        })
    }
}

/// Read a positive integer variable, returning the raw text on failure.
fn positive(var: &str, default: usize) -> Result<NonZeroUsize, String> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<NonZeroUsize>()
            .map_err(|_| raw.clone()),
        Err(_) => NonZeroUsize::new(default).ok_or_else(|| default.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 5] = [
        "HIRELEDGER_DATABASE",
        "HIRELEDGER_BACKUP_DIR",
        "HIRELEDGER_BATCH_SIZE",
        "HIRELEDGER_CSV_HEADER",
        "HIRELEDGER_ROW_GROUP_SIZE",
    ];

    fn clear_env() {
        // SAFETY: test-only code, single-threaded test execution
        unsafe {
            for var in VARS {
                std::env::remove_var(var);
            }
        }
    }

    // Environment variables are process-wide, so every case lives in one
    // test to keep them from racing under the parallel test runner.
    #[test]
    fn config_from_env() {
        clear_env();
        let config = HireledgerConfig::from_env().unwrap();
        assert_eq!(config.database, PathBuf::from("hireledger.db"));
        assert_eq!(config.backup_dir, PathBuf::from("backups"));
        assert_eq!(config.batch_size.get(), 1000);
        assert!(!config.csv_header);
        assert_eq!(config.row_group_size.get(), 10_000);

        // SAFETY: test-only code, single-threaded test execution
        unsafe {
            std::env::set_var("HIRELEDGER_DATABASE", "/tmp/h.db");
            std::env::set_var("HIRELEDGER_BATCH_SIZE", "250");
            std::env::set_var("HIRELEDGER_CSV_HEADER", "yes");
        }
        let config = HireledgerConfig::from_env().unwrap();
        assert_eq!(config.database, PathBuf::from("/tmp/h.db"));
        assert_eq!(config.batch_size.get(), 250);
        assert!(config.csv_header);

        // SAFETY: test-only code, single-threaded test execution
        unsafe {
            std::env::set_var("HIRELEDGER_BATCH_SIZE", "0");
        }
        let err = HireledgerConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBatchSize(ref v) if v == "0"));

        // SAFETY: test-only code, single-threaded test execution
        unsafe {
            std::env::set_var("HIRELEDGER_BATCH_SIZE", "10");
            std::env::set_var("HIRELEDGER_ROW_GROUP_SIZE", "lots");
        }
        let err = HireledgerConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRowGroupSize(_)));

        clear_env();
    }
}
