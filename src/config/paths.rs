//! Path management for app-backup
//!
//! Provides XDG-compliant path resolution for configuration, archives, and the
//! restore journal.
//!
//! ## Path Resolution Order
//!
//! 1. `APP_BACKUP_DATA_DIR` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_CONFIG_HOME/app-backup` or `~/.config/app-backup`
//! 3. Windows: `%APPDATA%\app-backup`

use std::path::PathBuf;

use crate::error::BackupError;
use crate::models::AggregateId;

/// Manages all paths used by app-backup
#[derive(Debug, Clone)]
pub struct BackupPaths {
    /// Base directory for all app-backup data
    base_dir: PathBuf,
}

impl BackupPaths {
    /// Create a new BackupPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, BackupError> {
        let base_dir = if let Ok(custom) = std::env::var("APP_BACKUP_DATA_DIR") {
            PathBuf::from(custom)
        } else {
            resolve_default_path()?
        };

        Ok(Self { base_dir })
    }

    /// Create BackupPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the root directory holding every archive
    pub fn archive_root(&self) -> PathBuf {
        self.base_dir.join("archives")
    }

    /// Get the directory holding the archives of one aggregate
    pub fn archives_for(&self, aggregate_id: AggregateId) -> PathBuf {
        self.archive_root().join(aggregate_id.as_uuid().to_string())
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the path to the restore journal
    pub fn journal_file(&self) -> PathBuf {
        self.base_dir.join("journal.log")
    }

    /// Ensure the base and archive directories exist
    pub fn ensure_directories(&self) -> Result<(), BackupError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| BackupError::Io(format!("Failed to create base directory: {}", e)))?;

        std::fs::create_dir_all(self.archive_root())
            .map_err(|e| BackupError::Io(format!("Failed to create archive directory: {}", e)))?;

        Ok(())
    }
}

#[cfg(not(windows))]
fn resolve_default_path() -> Result<PathBuf, BackupError> {
    let config_base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            let home = std::env::var("HOME").map_err(|_| {
                BackupError::Config("HOME environment variable not set".into())
            })?;
            PathBuf::from(home).join(".config")
        }
    };
    Ok(config_base.join("app-backup"))
}

#[cfg(windows)]
fn resolve_default_path() -> Result<PathBuf, BackupError> {
    let appdata = std::env::var("APPDATA")
        .map_err(|_| BackupError::Config("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("app-backup"))
}
