//! Engine settings for app-backup
//!
//! Manages archive retention and restore behaviour.

use serde::{Deserialize, Serialize};

use super::paths::BackupPaths;
use crate::error::BackupError;

/// Archive retention settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveRetention {
    /// Number of archives to keep per aggregate
    pub max_archives: u32,
}

impl Default for ArchiveRetention {
    fn default() -> Self {
        Self { max_archives: 10 }
    }
}

/// Restore behaviour settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreSettings {
    /// Whether restores and backups are recorded in the journal
    #[serde(default = "default_journal_enabled")]
    pub journal_enabled: bool,

    /// Maximum number of aggregates restored at the same time
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

fn default_journal_enabled() -> bool {
    true
}

fn default_max_parallel() -> usize {
    4
}

impl Default for RestoreSettings {
    fn default() -> Self {
        Self {
            journal_enabled: default_journal_enabled(),
            max_parallel: default_max_parallel(),
        }
    }
}

/// Settings for the backup engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Archive retention policy
    #[serde(default)]
    pub retention: ArchiveRetention,

    /// Restore behaviour
    #[serde(default)]
    pub restore: RestoreSettings,
}

fn default_schema_version() -> u32 {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            retention: ArchiveRetention::default(),
            restore: RestoreSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or return defaults if the file doesn't exist
    pub fn load_or_create(paths: &BackupPaths) -> Result<Self, BackupError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path)
                .map_err(|e| BackupError::Io(format!("Failed to read settings file: {}", e)))?;

            let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                BackupError::Config(format!("Failed to parse settings file: {}", e))
            })?;

            Ok(settings)
        } else {
            // Don't save yet - let caller decide when to persist
            Ok(Settings::default())
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &BackupPaths) -> Result<(), BackupError> {
        paths.ensure_directories()?;

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| BackupError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(paths.settings_file(), contents)
            .map_err(|e| BackupError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }
}
