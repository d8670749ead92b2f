//! The backup handler contract and the per-run state it works on
//!
//! A handler implements the backup/restore policy of one aggregate type. It
//! holds only its collaborators; everything that belongs to a single
//! invocation lives in a [`BackupRun`] or [`RestoreRun`] owned by the engine,
//! created fresh per aggregate and dropped once the run is over.

use std::collections::BTreeSet;

use crate::archive::{ArchiveReader, ArchiveWriter};
use crate::error::BackupResult;
use crate::models::{Actor, AggregateId, Envelope};

use super::mapping::UserMapping;
use super::membership::MembershipSet;
use super::reservation::Reservation;

/// State of one backup invocation
#[derive(Debug, Clone)]
pub struct BackupRun {
    pub aggregate_id: AggregateId,
    /// Users referenced by the stream, collected with set semantics
    pub users: BTreeSet<String>,
}

impl BackupRun {
    pub fn new(aggregate_id: AggregateId) -> Self {
        Self {
            aggregate_id,
            users: BTreeSet::new(),
        }
    }
}

/// State of one restore invocation
#[derive(Debug, Clone)]
pub struct RestoreRun {
    /// Id the aggregate is restored into
    pub aggregate_id: AggregateId,
    /// Name overriding the archived one
    pub new_name: Option<String>,
    pub mapping: UserMapping,
    pub members: MembershipSet,
    pub reservation: Reservation,
    /// Settings read from the archive, applied only once the stream is committed
    pub pending_settings: Option<serde_json::Value>,
    /// Recoverable degradations worth reporting to the operator
    pub warnings: Vec<String>,
}

impl RestoreRun {
    pub fn new(aggregate_id: AggregateId, initiator: Actor) -> Self {
        Self {
            aggregate_id,
            new_name: None,
            mapping: UserMapping::new(initiator),
            members: MembershipSet::new(),
            reservation: Reservation::new(aggregate_id),
            pending_settings: None,
            warnings: Vec::new(),
        }
    }

    /// The restoring actor
    pub fn initiator(&self) -> &Actor {
        self.mapping.initiator()
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(aggregate = %self.aggregate_id, "{}", message);
        self.warnings.push(message);
    }
}

/// Backup/restore policy for one aggregate type
///
/// Hooks run strictly in order for one aggregate: every `backup_event` before
/// `backup`; every `restore_event` before `restore`, then `complete_restore`
/// once the rebuilt stream is committed. `cleanup_restore` runs instead of
/// `complete_restore` when anything before the commit fails.
pub trait BackupHandler: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Called once per event while producing an archive
    fn backup_event(
        &self,
        event: &Envelope,
        run: &mut BackupRun,
        writer: &mut dyn ArchiveWriter,
    ) -> BackupResult<()>;

    /// Called once after all events; flushes collected state as attachments
    fn backup(&self, run: &mut BackupRun, writer: &mut dyn ArchiveWriter) -> BackupResult<()>;

    /// Called once per archived event; returns the event to commit
    fn restore_event(
        &self,
        event: Envelope,
        run: &mut RestoreRun,
        reader: &dyn ArchiveReader,
    ) -> BackupResult<Envelope>;

    /// Called once after all events were processed
    fn restore(&self, run: &mut RestoreRun, reader: &dyn ArchiveReader) -> BackupResult<()>;

    /// Called after the rebuilt stream was committed; failures are reported, not rolled back
    fn complete_restore(&self, run: &mut RestoreRun, reader: &dyn ArchiveReader)
        -> BackupResult<()>;

    /// Called when the restore failed before commit. Must be safe without a reservation.
    fn cleanup_restore(&self, run: &mut RestoreRun) -> BackupResult<()>;
}
