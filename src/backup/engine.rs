//! Backup and restore orchestration
//!
//! Restore of one aggregate runs in two phases:
//!
//! 1. Rebuild: every archived event goes through every handler in
//!    registration order, the handlers finalize, and the transformed stream is
//!    appended to the event store. Any failure up to and including the append
//!    runs `cleanup_restore` on every handler and fails the restore.
//! 2. Complete: the projection is replayed from the committed stream and saved,
//!    then every handler registers the aggregate in the global indexes. These
//!    failures are collected into the result and never rolled back.
//!
//! A panicking handler is treated like a failing one: before commit it fails
//! the restore and cleanup runs, after commit it becomes a post-commit failure.

use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Utc};

use crate::archive::{ArchiveManifest, ArchiveReader, ArchiveStore, ArchiveWriter};
use crate::config::RestoreSettings;
use crate::error::{BackupError, BackupResult};
use crate::journal::{JournalEntry, JournalLogger, Operation};
use crate::models::{Actor, AggregateId, AppState, Envelope};
use crate::services::{EventStore, StateStore};

use super::handler::{BackupHandler, BackupRun, RestoreRun};

/// Cooperative cancellation flag shared with a running restore
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What to restore and on whose behalf
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    /// Id the aggregate is restored into
    pub aggregate_id: AggregateId,
    /// The restoring actor; every unresolvable user maps to it
    pub initiator: Actor,
    /// Name overriding the archived one
    pub new_name: Option<String>,
}

impl RestoreRequest {
    pub fn new(aggregate_id: AggregateId, initiator: Actor) -> Self {
        Self {
            aggregate_id,
            initiator,
            new_name: None,
        }
    }

    /// Restore into a freshly generated id
    pub fn fresh(initiator: Actor) -> Self {
        Self::new(AggregateId::new(), initiator)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.new_name = Some(name.into());
        self
    }
}

/// One entry of a batch restore
#[derive(Clone, Copy)]
pub struct RestoreJob<'a> {
    pub request: &'a RestoreRequest,
    pub reader: &'a dyn ArchiveReader,
}

/// Result of a committed restore
#[derive(Debug, Clone)]
pub struct RestoreResult {
    pub aggregate_id: AggregateId,
    pub name: Option<String>,
    pub events_restored: usize,
    /// Active members after replaying the restored stream
    pub members: Vec<String>,
    /// Recoverable degradations, e.g. missing attachments
    pub warnings: Vec<String>,
    /// Index or projection updates that failed after commit
    pub post_commit_failures: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RestoreResult {
    /// True when every post-commit step succeeded
    pub fn is_clean(&self) -> bool {
        self.post_commit_failures.is_empty()
    }

    /// Get a summary of what was restored
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Restored {} ({}) with {} events and {} members",
            self.name.as_deref().unwrap_or("unnamed"),
            self.aggregate_id,
            self.events_restored,
            self.members.len()
        );

        if !self.warnings.is_empty() {
            summary.push_str(&format!(", {} warnings", self.warnings.len()));
        }
        if !self.post_commit_failures.is_empty() {
            summary.push_str(&format!(
                ", {} post-commit failures",
                self.post_commit_failures.len()
            ));
        }

        summary
    }
}

/// Drives backup handlers over event streams and archives
pub struct BackupEngine {
    handlers: Vec<Arc<dyn BackupHandler>>,
    events: Arc<dyn EventStore>,
    states: Arc<dyn StateStore>,
    journal: Option<JournalLogger>,
    journal_enabled: bool,
    max_parallel: usize,
}

impl BackupEngine {
    pub fn new(events: Arc<dyn EventStore>, states: Arc<dyn StateStore>) -> Self {
        let defaults = RestoreSettings::default();
        Self {
            handlers: Vec::new(),
            events,
            states,
            journal: None,
            journal_enabled: defaults.journal_enabled,
            max_parallel: defaults.max_parallel,
        }
    }

    /// Register a handler; handlers run in registration order
    pub fn with_handler(mut self, handler: Arc<dyn BackupHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn with_journal(mut self, journal: JournalLogger) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn with_settings(mut self, settings: &RestoreSettings) -> Self {
        self.journal_enabled = settings.journal_enabled;
        self.max_parallel = settings.max_parallel.max(1);
        self
    }

    /// Journal in use, if any
    pub fn journal(&self) -> Option<&JournalLogger> {
        self.journal.as_ref().filter(|_| self.journal_enabled)
    }

    /// Write the stream and attachments of an aggregate into `writer`
    ///
    /// Returns the number of events written.
    pub fn backup(&self, aggregate_id: AggregateId, writer: &mut dyn ArchiveWriter) -> BackupResult<usize> {
        match self.run_backup(aggregate_id, writer) {
            Ok((count, name)) => {
                tracing::info!(aggregate = %aggregate_id, events = count, "backup written");
                let mut entry = JournalEntry::backup(aggregate_id, count);
                if let Some(name) = name {
                    entry = entry.with_name(name);
                }
                self.record(&entry);
                Ok(count)
            }
            Err(e) => {
                tracing::warn!(aggregate = %aggregate_id, error = %e, "backup failed");
                self.record(&JournalEntry::failed(Operation::Backup, aggregate_id, e.to_string()));
                Err(e)
            }
        }
    }

    /// Back up into a new archive of `store`, then apply its retention policy
    ///
    /// A failed backup removes its unfinished archive directory.
    pub fn backup_to_store(
        &self,
        store: &ArchiveStore,
        aggregate_id: AggregateId,
    ) -> BackupResult<ArchiveManifest> {
        let mut archive = store.create_archive(aggregate_id)?;
        let root = archive.root().to_path_buf();

        let written = self
            .backup(aggregate_id, &mut archive)
            .and_then(|_| archive.finish());

        let manifest = match written {
            Ok(manifest) => manifest,
            Err(e) => {
                if let Err(remove_err) = fs::remove_dir_all(&root) {
                    tracing::warn!(
                        path = %root.display(),
                        error = %remove_err,
                        "failed to remove unfinished archive"
                    );
                }
                return Err(e);
            }
        };

        store.enforce_retention(aggregate_id)?;
        Ok(manifest)
    }

    fn run_backup(
        &self,
        aggregate_id: AggregateId,
        writer: &mut dyn ArchiveWriter,
    ) -> BackupResult<(usize, Option<String>)> {
        let events = self.events.read_stream(aggregate_id)?;
        if events.is_empty() {
            return Err(BackupError::aggregate_not_found(aggregate_id.to_string()));
        }

        let mut run = BackupRun::new(aggregate_id);

        for event in &events {
            writer.write_event(event)?;
            for handler in &self.handlers {
                handler.backup_event(event, &mut run, writer)?;
            }
        }

        for handler in &self.handlers {
            handler.backup(&mut run, writer)?;
        }

        let name = AppState::replay(&events).name;
        Ok((events.len(), Some(name).filter(|n| !n.is_empty())))
    }

    /// Restore one aggregate from an archive
    ///
    /// Fails only when nothing was committed; in that case every handler's
    /// cleanup has run. Once the stream is committed the restore succeeds and
    /// later failures are listed in [`RestoreResult::post_commit_failures`].
    pub fn restore(
        &self,
        request: &RestoreRequest,
        reader: &dyn ArchiveReader,
        cancel: &CancellationToken,
    ) -> BackupResult<RestoreResult> {
        let started_at = Utc::now();
        let mut run = RestoreRun::new(request.aggregate_id, request.initiator.clone());
        run.new_name = request.new_name.clone();

        let restored = match contain_panic(|| self.rebuild(&mut run, reader, cancel)) {
            Ok(restored) => restored,
            Err(e) => {
                tracing::warn!(aggregate = %request.aggregate_id, error = %e, "restore failed, cleaning up");
                self.cleanup(&mut run);
                let mut entry = JournalEntry::failed(Operation::Restore, run.aggregate_id, e.to_string());
                if let Some(name) = run.reservation.name() {
                    entry = entry.with_name(name);
                }
                self.record(&entry);
                return Err(e);
            }
        };

        let failures = self.complete(&mut run, &restored, reader);

        let result = RestoreResult {
            aggregate_id: run.aggregate_id,
            name: run.reservation.name().map(str::to_string),
            events_restored: restored.len(),
            members: run.members.iter().cloned().collect(),
            warnings: std::mem::take(&mut run.warnings),
            post_commit_failures: failures,
            started_at,
            completed_at: Utc::now(),
        };

        tracing::info!(
            aggregate = %result.aggregate_id,
            events = result.events_restored,
            clean = result.is_clean(),
            "restore committed"
        );
        self.record(&JournalEntry::restored(
            result.aggregate_id,
            result.name.clone(),
            result.events_restored,
            &result.post_commit_failures,
        ));

        Ok(result)
    }

    /// Restore several aggregates concurrently, at most `max_parallel` at a time
    ///
    /// Results are returned in job order. A failing job affects only itself.
    pub fn restore_all(
        &self,
        jobs: &[RestoreJob<'_>],
        cancel: &CancellationToken,
    ) -> Vec<BackupResult<RestoreResult>> {
        let mut results = Vec::with_capacity(jobs.len());

        for chunk in jobs.chunks(self.max_parallel.max(1)) {
            let chunk_results: Vec<BackupResult<RestoreResult>> = thread::scope(|scope| {
                let workers: Vec<_> = chunk
                    .iter()
                    .map(|job| scope.spawn(move || self.restore(job.request, job.reader, cancel)))
                    .collect();

                workers
                    .into_iter()
                    .map(|worker| {
                        worker.join().unwrap_or_else(|_| {
                            Err(BackupError::Storage("Restore worker panicked".into()))
                        })
                    })
                    .collect()
            });
            results.extend(chunk_results);
        }

        results
    }

    fn rebuild(
        &self,
        run: &mut RestoreRun,
        reader: &dyn ArchiveReader,
        cancel: &CancellationToken,
    ) -> BackupResult<Vec<Envelope>> {
        if self.handlers.is_empty() {
            return Err(BackupError::Config("No backup handler registered".into()));
        }

        let mut restored = Vec::new();

        for event in reader.events()? {
            if cancel.is_cancelled() {
                return Err(BackupError::Cancelled);
            }

            let mut event = event?;
            for handler in &self.handlers {
                event = handler.restore_event(event, run, reader)?;
            }
            restored.push(event);
        }

        if restored.is_empty() {
            return Err(BackupError::Validation("Archive contains no events".into()));
        }

        for handler in &self.handlers {
            handler.restore(run, reader)?;
        }

        if cancel.is_cancelled() {
            return Err(BackupError::Cancelled);
        }

        self.events.append_stream(run.aggregate_id, &restored)?;
        tracing::debug!(aggregate = %run.aggregate_id, events = restored.len(), "stream committed");

        Ok(restored)
    }

    fn complete(
        &self,
        run: &mut RestoreRun,
        restored: &[Envelope],
        reader: &dyn ArchiveReader,
    ) -> Vec<String> {
        let mut failures = Vec::new();

        let state = AppState::replay(restored);
        if let Err(e) = self.states.save(run.aggregate_id, &state) {
            failures.push(format!("projection: {}", e));
        }

        for handler in &self.handlers {
            if let Err(e) = contain_panic(|| handler.complete_restore(run, reader)) {
                failures.push(format!("{}: {}", handler.name(), e));
            }
        }

        for failure in &failures {
            tracing::warn!(aggregate = %run.aggregate_id, failure = failure.as_str(), "post-commit step failed");
        }

        failures
    }

    fn cleanup(&self, run: &mut RestoreRun) {
        for handler in &self.handlers {
            if let Err(e) = contain_panic(|| handler.cleanup_restore(run)) {
                tracing::warn!(
                    aggregate = %run.aggregate_id,
                    handler = handler.name(),
                    error = %e,
                    "restore cleanup failed"
                );
                self.record(&JournalEntry::failed(
                    Operation::Cleanup,
                    run.aggregate_id,
                    format!("{}: {}", handler.name(), e),
                ));
            }
        }
    }

    fn record(&self, entry: &JournalEntry) {
        if let Some(journal) = self.journal() {
            if let Err(e) = journal.log(entry) {
                tracing::warn!(error = %e, "failed to write journal entry");
            }
        }
    }
}

/// Run handler code, turning a panic into `HandlerPanicked`
fn contain_panic<T>(f: impl FnOnce() -> BackupResult<T>) -> BackupResult<T> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(BackupError::HandlerPanicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
