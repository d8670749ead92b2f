//! Backup and restore of app aggregates
//!
//! # Architecture
//!
//! - `BackupEngine`: reads streams, drives handlers, commits restored streams
//!   and collects post-commit failures
//! - `BackupHandler`: per aggregate type backup/restore policy;
//!   `AppBackupHandler` implements it for apps
//! - `UserMapping`, `MembershipSet`, `Reservation`: per-run state carried by
//!   [`RestoreRun`], created fresh for every restore
//!
//! # Example
//!
//! ```rust,ignore
//! use app_backup::backup::{AppBackupHandler, BackupEngine, CancellationToken, RestoreRequest};
//!
//! let engine = BackupEngine::new(events, states)
//!     .with_handler(Arc::new(AppBackupHandler::new(resolver, names, personal, settings)));
//!
//! let manifest = engine.backup_to_store(&store, app_id)?;
//!
//! // In the target environment
//! let latest = store.latest_archive(app_id)?.ok_or(BackupError::aggregate_not_found("app"))?;
//! let archive = store.open_archive(&latest)?;
//! let result = engine.restore(
//!     &RestoreRequest::new(app_id, operator),
//!     &archive,
//!     &CancellationToken::new(),
//! )?;
//! println!("{}", result.summary());
//! ```

mod apps;
mod engine;
mod handler;
mod mapping;
mod membership;
mod reservation;

pub use apps::{AppBackupHandler, SETTINGS_ATTACHMENT, USERS_ATTACHMENT};
pub use engine::{BackupEngine, CancellationToken, RestoreJob, RestoreRequest, RestoreResult};
pub use handler::{BackupHandler, BackupRun, RestoreRun};
pub use mapping::UserMapping;
pub use membership::MembershipSet;
pub use reservation::Reservation;
