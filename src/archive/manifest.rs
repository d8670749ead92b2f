//! Archive manifest

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::AggregateId;

/// Current on-disk archive layout version
pub const ARCHIVE_SCHEMA_VERSION: u32 = 1;

/// Describes a finished archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    /// Schema version for migration support
    pub schema_version: u32,
    /// Aggregate the archive was taken from
    pub aggregate_id: AggregateId,
    /// When writing started
    pub created_at: DateTime<Utc>,
    /// When the archive was finished
    pub completed_at: DateTime<Utc>,
    /// Number of events in the stream
    pub event_count: u64,
    /// Names of the stored attachments
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl ArchiveManifest {
    pub fn has_attachment(&self, name: &str) -> bool {
        self.attachments.iter().any(|a| a == name)
    }
}
