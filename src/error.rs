//! Custom error types for app-backup
//!
//! This module defines the error hierarchy for backup and restore operations
//! using thiserror for ergonomic error definitions.

use thiserror::Error;

/// The main error type for backup and restore operations
#[derive(Error, Debug)]
pub enum BackupError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Validation errors for archives, names and requests
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// A named attachment is missing from the archive
    #[error("Attachment not found: {0}")]
    AttachmentNotFound(String),

    /// The name is already claimed by a different aggregate
    #[error("Name or id not available: {name}")]
    ReservationConflict { name: String },

    /// The identity resolution service failed
    #[error("Identity resolution unavailable: {0}")]
    ResolutionUnavailable(String),

    /// Index registration failed after the restored stream was committed
    #[error("Post-commit index failure: {0}")]
    PostCommitIndex(String),

    /// Archive format or layout errors
    #[error("Archive error: {0}")]
    Archive(String),

    /// Storage errors from collaborator stores
    #[error("Storage error: {0}")]
    Storage(String),

    /// The operation was cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// A handler panicked while restoring
    #[error("Handler panicked: {0}")]
    HandlerPanicked(String),
}

impl BackupError {
    /// Create an "attachment not found" error
    pub fn attachment_not_found(name: impl Into<String>) -> Self {
        Self::AttachmentNotFound(name.into())
    }

    /// Create a "not found" error for aggregates
    pub fn aggregate_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Aggregate",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a missing attachment
    pub fn is_attachment_not_found(&self) -> bool {
        matches!(self, Self::AttachmentNotFound(_))
    }

    /// Check if this is a reservation conflict
    pub fn is_reservation_conflict(&self) -> bool {
        matches!(self, Self::ReservationConflict { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<std::io::Error> for BackupError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BackupError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for backup and restore operations
pub type BackupResult<T> = Result<T, BackupError>;
