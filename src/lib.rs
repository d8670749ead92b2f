//! app-backup - Backup and restore for event-sourced app aggregates
//!
//! This library serializes an app's full event history plus auxiliary state
//! into a portable archive and replays such an archive in another environment.
//! Environment-specific identities are rewritten on the way in: users are
//! resolved through the lookup table captured at backup time, unique names are
//! reserved speculatively and released again when a restore fails.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `models`: Events, identities and the app projection
//! - `archive`: Archive readers/writers and the on-disk archive store
//! - `services`: Collaborator traits and in-memory implementations
//! - `backup`: Backup handlers and the backup/restore engine
//! - `journal`: Append-only record of backups and restores
//!
//! # Example
//!
//! ```rust,ignore
//! use app_backup::archive::ArchiveStore;
//! use app_backup::config::{BackupPaths, Settings};
//!
//! let paths = BackupPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! let store = ArchiveStore::new(paths.clone(), settings.retention.clone());
//! ```

pub mod archive;
pub mod backup;
pub mod config;
pub mod error;
pub mod journal;
pub mod models;
pub mod services;

pub use backup::{BackupEngine, BackupHandler, RestoreRequest, RestoreResult};
pub use error::{BackupError, BackupResult};
