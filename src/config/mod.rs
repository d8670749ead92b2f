//! Configuration module for app-backup
//!
//! This module provides configuration management including:
//! - XDG-compliant path resolution
//! - Engine settings persistence

pub mod paths;
pub mod settings;

pub use paths::BackupPaths;
pub use settings::{ArchiveRetention, RestoreSettings, Settings};
