//! Journal entry data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::AggregateId;

/// Kinds of operations recorded in the journal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Backup,
    Restore,
    /// Compensation after a failed restore
    Cleanup,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Backup => write!(f, "BACKUP"),
            Operation::Restore => write!(f, "RESTORE"),
            Operation::Cleanup => write!(f, "CLEANUP"),
        }
    }
}

/// How an operation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Succeeded,
    Failed,
    /// Committed, but some post-commit registration failed
    Partial,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Succeeded => write!(f, "ok"),
            Outcome::Failed => write!(f, "failed"),
            Outcome::Partial => write!(f, "partial"),
        }
    }
}

/// A single journal entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// When the operation finished (UTC)
    pub timestamp: DateTime<Utc>,

    pub operation: Operation,

    /// Full id of the aggregate the operation ran on
    pub aggregate_id: String,

    /// Name of the aggregate, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate_name: Option<String>,

    pub outcome: Outcome,

    /// Number of events written or restored
    #[serde(default)]
    pub events: usize,

    /// Error text or failure summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl JournalEntry {
    fn new(operation: Operation, aggregate_id: AggregateId, outcome: Outcome) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            aggregate_id: aggregate_id.as_uuid().to_string(),
            aggregate_name: None,
            outcome,
            events: 0,
            detail: None,
        }
    }

    /// Entry for a finished backup
    pub fn backup(aggregate_id: AggregateId, events: usize) -> Self {
        Self {
            events,
            ..Self::new(Operation::Backup, aggregate_id, Outcome::Succeeded)
        }
    }

    /// Entry for a committed restore; partial when post-commit failures were reported
    pub fn restored(
        aggregate_id: AggregateId,
        name: Option<String>,
        events: usize,
        failures: &[String],
    ) -> Self {
        let (outcome, detail) = if failures.is_empty() {
            (Outcome::Succeeded, None)
        } else {
            (Outcome::Partial, Some(failures.join("; ")))
        };

        Self {
            aggregate_name: name,
            events,
            detail,
            ..Self::new(Operation::Restore, aggregate_id, outcome)
        }
    }

    /// Entry for an operation that failed
    pub fn failed(operation: Operation, aggregate_id: AggregateId, detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            ..Self::new(operation, aggregate_id, Outcome::Failed)
        }
    }

    /// Attach the aggregate name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.aggregate_name = Some(name.into());
        self
    }

    /// Format the entry for human-readable output
    pub fn format_human_readable(&self) -> String {
        let mut output = format!(
            "[{}] {} {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.operation,
            self.aggregate_id,
            self.outcome
        );

        if let Some(name) = &self.aggregate_name {
            output.push_str(&format!(" ({})", name));
        }

        if self.events > 0 {
            output.push_str(&format!(", {} events", self.events));
        }

        if let Some(detail) = &self.detail {
            output.push_str(&format!("\n  {}", detail));
        }

        output
    }
}
